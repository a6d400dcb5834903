//! Fixed momentum, displacement and source-time lists.

/// On-axis momenta with |n| <= 3, as `"x y z"` strings.
pub fn momentum_list() -> Vec<String> {
    let mut moms = vec!["0 0 0".to_string()];
    for n in 1..=3i32 {
        for axis in 0..3 {
            for sign in [1, -1] {
                let mut p = [0i32; 3];
                p[axis] = sign * n;
                moms.push(format_momentum(p));
            }
        }
    }
    moms
}

/// Covariant-derivative displacement paths, from none up to two links.
pub fn displacement_list() -> Vec<String> {
    [
        "", "1", "2", "3", "1 1", "2 2", "3 3", "1 2", "1 3", "2 1", "2 3", "3 1", "3 2",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Every integer momentum with `min <= p^2 <= max`, ordered by `p^2`.
pub fn momenta_in_window(min: u32, max: u32) -> Vec<String> {
    let reach = (max as f64).sqrt().floor() as i32;
    let mut moms = Vec::new();
    for x in -reach..=reach {
        for y in -reach..=reach {
            for z in -reach..=reach {
                let p2 = (x * x + y * y + z * z) as u32;
                if (min..=max).contains(&p2) {
                    moms.push((p2, [x, y, z]));
                }
            }
        }
    }
    // descending components within a shell puts +n before -n
    moms.sort_by(|(a2, a), (b2, b)| a2.cmp(b2).then_with(|| b.cmp(a)));
    moms.into_iter().map(|(_, p)| format_momentum(p)).collect()
}

/// Evenly spaced source times `0, step, 2*step, ... < t_fwd`.
///
/// The step is `t_fwd / num_tsrc` rounded half to even. Returns `None` when
/// either argument is zero or there would be more sources than time slices.
pub fn t_sources(t_fwd: u32, num_tsrc: u32) -> Option<Vec<u32>> {
    if t_fwd == 0 || num_tsrc == 0 || num_tsrc > t_fwd {
        return None;
    }
    let step = (t_fwd as f64 / num_tsrc as f64).round_ties_even() as usize;
    Some((0..t_fwd).step_by(step.max(1)).collect())
}

fn format_momentum(p: [i32; 3]) -> String {
    format!("{} {} {}", p[0], p[1], p[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_momentum_list() {
        let moms = momentum_list();
        assert_eq!(moms.len(), 19);
        assert_eq!(&moms[..4], &["0 0 0", "1 0 0", "-1 0 0", "0 1 0"]);
        assert_eq!(moms[18], "0 0 -3");
    }

    #[test]
    fn test_displacement_list() {
        let disp = displacement_list();
        assert_eq!(disp.len(), 13);
        assert_eq!(disp[0], "");
        assert_eq!(disp[12], "3 2");
    }

    #[test]
    fn test_momenta_in_window() {
        let moms = momenta_in_window(0, 1);
        assert_eq!(moms.len(), 7);
        assert_eq!(moms[0], "0 0 0");
        assert_eq!(moms[1], "1 0 0");
        assert_eq!(moms[6], "-1 0 0");

        // p^2 = 2 shell only
        assert_eq!(momenta_in_window(2, 2).len(), 12);
        // p^2 = 3 has 8 vectors, p^2 = 4 has 6
        assert_eq!(momenta_in_window(3, 4).len(), 14);
        assert!(momenta_in_window(5, 4).is_empty());
    }

    #[test]
    fn test_t_sources() {
        assert_eq!(t_sources(96, 4), Some(vec![0, 24, 48, 72]));
        assert_eq!(t_sources(64, 3), Some(vec![0, 21, 42, 63]));
        assert_eq!(t_sources(10, 4), Some(vec![0, 2, 4, 6, 8]));
        assert_eq!(t_sources(64, 0), None);
        assert_eq!(t_sources(4, 8), None);
    }
}
