use indicatif::{ProgressBar, ProgressStyle};
use sidereal_core::process::{ProcessObserver, RunSummary};

/// Progress bar fed by the process controller.
pub struct BarObserver {
    bar: ProgressBar,
}

impl BarObserver {
    pub fn new() -> anyhow::Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:20} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProcessObserver for BarObserver {
    fn process_started(&self, process: &str, items: usize, passes: u32) {
        self.bar.reset();
        self.bar.set_length((items * passes as usize) as u64);
        self.bar.set_message(process.to_string());
    }

    fn pass_started(&self, pass: u32) {
        self.bar.set_message(format!("stack (pass {})", pass));
    }

    fn item_processed(&self, _item: &str) {
        self.bar.inc(1);
    }

    fn item_failed(&self, item: &str, reason: &str) {
        self.bar.println(format!("  skipped {}: {}", item, reason));
    }

    fn process_ended(&self, summary: &RunSummary) {
        self.bar
            .finish_with_message(format!("{} {:?}", summary.process, summary.status));
    }
}
