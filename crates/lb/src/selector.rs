//! Picks which origin should receive the next request: the alive origin
//! with the smallest cumulative traffic counter, ties broken by list order.
//! If no origin is alive, falls back to the first-listed origin so the
//! forwarder can attempt it and fail with a clean 503 rather than the
//! selector itself having to invent an error path.

use std::sync::Arc;

use crate::origin::Origin;

pub fn select(origins: &[Arc<Origin>]) -> usize {
    let mut best: Option<(usize, u64)> = None;
    for (i, origin) in origins.iter().enumerate() {
        if !origin.is_alive() {
            continue;
        }
        let traffic = origin.traffic();
        match best {
            Some((_, best_traffic)) if traffic >= best_traffic => {}
            _ => best = Some((i, traffic)),
        }
    }
    best.map(|(i, _)| i).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(states: &[(bool, u64)]) -> Vec<Arc<Origin>> {
        states
            .iter()
            .enumerate()
            .map(|(i, &(alive, traffic))| {
                let origin = Origin::new(format!("origin-{i}"));
                origin.set_alive(alive);
                origin.add_traffic(traffic);
                Arc::new(origin)
            })
            .collect()
    }

    #[test]
    fn all_alive_all_zero_picks_first() {
        let origins = registry(&[(true, 0), (true, 0), (true, 0)]);
        assert_eq!(select(&origins), 0);
    }

    #[test]
    fn scenario_s1() {
        // A:0 B:0 C:0, all alive -> A.
        let origins = registry(&[(true, 0), (true, 0), (true, 0)]);
        assert_eq!(select(&origins), 0);

        // A:50 B:20 C:0, all alive -> C.
        let origins = registry(&[(true, 50), (true, 20), (true, 0)]);
        assert_eq!(select(&origins), 2);

        // A:50 B:20 C:40, all alive -> B.
        let origins = registry(&[(true, 50), (true, 20), (true, 40)]);
        assert_eq!(select(&origins), 1);

        // A:50 B:20 C:40, B down -> C.
        let origins = registry(&[(true, 50), (false, 20), (true, 40)]);
        assert_eq!(select(&origins), 2);

        // A:50 B:70 C:40, C down -> A.
        let origins = registry(&[(true, 50), (true, 70), (false, 40)]);
        assert_eq!(select(&origins), 0);
    }

    #[test]
    fn no_origin_alive_falls_back_to_first() {
        let origins = registry(&[(false, 10), (false, 0), (false, 5)]);
        assert_eq!(select(&origins), 0);
    }

    proptest::proptest! {
        #[test]
        fn chosen_is_alive_and_minimal_among_alive(
            traffics in proptest::collection::vec(0u64..1_000_000, 1..8),
            alive in proptest::collection::vec(proptest::bool::ANY, 1..8),
        ) {
            let len = traffics.len().min(alive.len());
            let origins: Vec<Arc<Origin>> = (0..len)
                .map(|i| {
                    let origin = Origin::new(format!("origin-{i}"));
                    origin.set_alive(alive[i]);
                    origin.add_traffic(traffics[i]);
                    Arc::new(origin)
                })
                .collect();

            let chosen = select(&origins);
            if origins.iter().any(|o| o.is_alive()) {
                proptest::prop_assert!(origins[chosen].is_alive());
                let min_alive = origins
                    .iter()
                    .filter(|o| o.is_alive())
                    .map(|o| o.traffic())
                    .min()
                    .unwrap();
                proptest::prop_assert_eq!(origins[chosen].traffic(), min_alive);
                // Tie-break: no earlier-listed alive origin shares the min.
                for earlier in &origins[..chosen] {
                    if earlier.is_alive() {
                        proptest::prop_assert!(earlier.traffic() > min_alive);
                    }
                }
            } else {
                proptest::prop_assert_eq!(chosen, 0);
            }
        }
    }
}
