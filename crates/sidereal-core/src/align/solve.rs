use crate::geometry::{AffineTransform, Point};

/// A reference position and where it was found in the candidate image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SquareMatch {
    pub reference: Point,
    pub candidate: Point,
}

/// Least-squares similarity mapping reference points onto candidate points.
///
/// Translation is always solved. Rotation and scale are solved only when
/// enabled and when at least two distinct points are available.
pub fn solve_transform(
    matches: &[SquareMatch],
    compute_scale: bool,
    compute_rotation: bool,
) -> Option<AffineTransform> {
    if matches.is_empty() {
        return None;
    }
    let n = matches.len() as f64;
    let mean = |f: fn(&SquareMatch) -> Point| {
        let (sx, sy) = matches.iter().map(f).fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
        Point::new(sx / n, sy / n)
    };
    let p_mean = mean(|m| m.reference);
    let q_mean = mean(|m| m.candidate);

    let (mut dot, mut cross, mut norm) = (0.0, 0.0, 0.0);
    for m in matches {
        let (px, py) = (m.reference.x - p_mean.x, m.reference.y - p_mean.y);
        let (qx, qy) = (m.candidate.x - q_mean.x, m.candidate.y - q_mean.y);
        dot += px * qx + py * qy;
        cross += px * qy - py * qx;
        norm += px * px + py * py;
    }

    // Linear part [[a, -b], [b, a]] = scale * rotation.
    let (mut a, mut b) = (1.0, 0.0);
    if norm > 1e-9 && (compute_scale || compute_rotation) {
        a = dot / norm;
        b = if compute_rotation { cross / norm } else { 0.0 };
        if !compute_scale {
            let len = (a * a + b * b).sqrt();
            if len > 1e-12 {
                a /= len;
                b /= len;
            } else {
                (a, b) = (1.0, 0.0);
            }
        }
    }

    Some(AffineTransform {
        m11: a,
        m12: b,
        m21: -b,
        m22: a,
        tx: q_mean.x - (a * p_mean.x - b * p_mean.y),
        ty: q_mean.y - (b * p_mean.x + a * p_mean.y),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_for(t: &AffineTransform, points: &[Point]) -> Vec<SquareMatch> {
        points
            .iter()
            .map(|&p| SquareMatch {
                reference: p,
                candidate: t.apply(p),
            })
            .collect()
    }

    fn close(a: &AffineTransform, b: &AffineTransform) -> bool {
        [
            a.m11 - b.m11,
            a.m12 - b.m12,
            a.m21 - b.m21,
            a.m22 - b.m22,
            a.tx - b.tx,
            a.ty - b.ty,
        ]
        .iter()
        .all(|d| d.abs() < 1e-9)
    }

    #[test]
    fn single_square_is_translation() {
        let m = [SquareMatch {
            reference: Point::new(10.0, 10.0),
            candidate: Point::new(12.5, 9.0),
        }];
        let t = solve_transform(&m, true, true).unwrap();
        assert!(close(&t, &AffineTransform::translation(2.5, -1.0)));
    }

    #[test]
    fn recovers_similarity() {
        let truth = AffineTransform::similarity(1.02, 0.05, 3.0, -2.0);
        let pts = [
            Point::new(20.0, 20.0),
            Point::new(80.0, 25.0),
            Point::new(50.0, 90.0),
        ];
        let t = solve_transform(&matches_for(&truth, &pts), true, true).unwrap();
        assert!(close(&t, &truth));
    }

    #[test]
    fn rotation_without_scale_is_unit() {
        let truth = AffineTransform::similarity(1.1, 0.1, 0.0, 0.0);
        let pts = [Point::new(0.0, 0.0), Point::new(40.0, 0.0)];
        let t = solve_transform(&matches_for(&truth, &pts), false, true).unwrap();
        assert!((t.scale_factor() - 1.0).abs() < 1e-9);
        assert!((t.rotation_angle() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn translation_only_averages_offsets() {
        let m = [
            SquareMatch {
                reference: Point::new(0.0, 0.0),
                candidate: Point::new(1.0, 0.0),
            },
            SquareMatch {
                reference: Point::new(50.0, 0.0),
                candidate: Point::new(53.0, 2.0),
            },
        ];
        let t = solve_transform(&m, false, false).unwrap();
        assert!(close(&t, &AffineTransform::translation(2.0, 1.0)));
    }
}
