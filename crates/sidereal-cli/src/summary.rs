use console::Style;
use sidereal_core::config::{RunConfig, StackMethod};
use sidereal_core::process::{RunStatus, RunSummary};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    warning: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            warning: Style::new().yellow(),
        }
    }
}

pub fn print_run_summary(config: &RunConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Sidereal Stack"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(14)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Inputs"),
        s.value.apply_to(format!("{} file(s)", config.inputs.len()))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    let threads = if config.threads == 0 {
        "auto".to_string()
    } else {
        config.threads.to_string()
    };
    println!(
        "  {:<14}{}",
        s.label.apply_to("Threads"),
        s.value.apply_to(threads)
    );
    println!();

    let align = &config.alignment;
    if config.stacking.method == StackMethod::Calibration {
        println!(
            "  {:<14}{}",
            s.header.apply_to("Alignment"),
            s.disabled.apply_to("skipped (calibration)")
        );
    } else {
        println!("  {}", s.header.apply_to("Alignment"));
        println!(
            "    {:<12}{}",
            s.label.apply_to("Reference"),
            s.value
                .apply_to(align.reference.as_deref().unwrap_or("first input"))
        );
        let squares = if align.squares.is_empty() {
            format!("1 centered, {} px", align.square_size)
        } else {
            format!("{}", align.squares.len())
        };
        println!(
            "    {:<12}{}",
            s.label.apply_to("Squares"),
            s.value.apply_to(squares)
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Cutoff"),
            s.value.apply_to(align.cutoff)
        );
        if align.check_alignment {
            println!(
                "    {:<12}{}",
                s.label.apply_to("Thresholds"),
                s.value.apply_to(format!(
                    "peak >= {}, precision <= {} px",
                    align.value_threshold, align.precision_threshold
                ))
            );
        } else {
            println!(
                "    {:<12}{}",
                s.label.apply_to("Thresholds"),
                s.disabled.apply_to("disabled")
            );
        }
    }
    println!();

    let stack = &config.stacking;
    println!("  {}", s.header.apply_to("Stacking"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Method"),
        s.method.apply_to(stack.method)
    );
    if stack.method == StackMethod::SigmaReject {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Sigma"),
            s.value.apply_to(stack.sigma_threshold)
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Post"),
        s.value.apply_to(format!("{:?}", stack.post_stack))
    );
    if stack.scale != 1.0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Scale"),
            s.value.apply_to(format!("{}x", stack.scale))
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Kernel"),
        s.method
            .apply_to(stack.interpolator.as_deref().unwrap_or("auto"))
    );
    println!();
}

/// What a list process did, with its skipped items.
pub fn print_process_result(summary: &RunSummary) {
    let s = Styles::new();

    let status = match summary.status {
        RunStatus::Completed => s.method.apply_to("completed"),
        RunStatus::Cancelled => s.disabled.apply_to("cancelled"),
    };
    println!(
        "  {:<14}{} ({} item(s))",
        s.header.apply_to(summary.process),
        status,
        s.value.apply_to(summary.processed)
    );
    for failure in &summary.failures {
        println!(
            "    {} {}",
            s.warning.apply_to(&failure.item),
            s.label.apply_to(&failure.reason)
        );
    }
}
