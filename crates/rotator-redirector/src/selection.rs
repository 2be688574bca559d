use rotator_core::{LinkRecord, Strategy};

/// Picks the destination for one resolution.
///
/// Links are first ordered by ascending hit count (stable, so ties keep
/// their incoming order). [`Strategy::RoundRobin`] then takes the front,
/// which is least-used selection: rotation only happens because the chosen
/// link's count grows past the others. [`Strategy::Random`] draws uniformly
/// over every link, not just the least-used ones.
///
/// Returns `None` for an empty set.
pub fn select_link(strategy: Strategy, mut links: Vec<LinkRecord>) -> Option<LinkRecord> {
    if links.is_empty() {
        return None;
    }

    links.sort_by_key(|link| link.total_hit);

    let index = match strategy {
        Strategy::RoundRobin => 0,
        Strategy::Random => rand::random_range(0..links.len()),
    };
    Some(links.swap_remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::Timestamp;
    use rotator_core::ShortCode;

    fn links(hits: &[u64]) -> Vec<LinkRecord> {
        let now = Timestamp::now();
        hits.iter()
            .enumerate()
            .map(|(i, &total_hit)| LinkRecord {
                id: i as u64 + 1,
                code: ShortCode::new_unchecked("abc123"),
                original: format!("https://{i}.example"),
                total_hit,
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    #[test]
    fn empty_set_selects_nothing() {
        assert!(select_link(Strategy::RoundRobin, Vec::new()).is_none());
        assert!(select_link(Strategy::Random, Vec::new()).is_none());
    }

    #[test]
    fn round_robin_takes_a_least_used_link() {
        for _ in 0..50 {
            let chosen = select_link(Strategy::RoundRobin, links(&[5, 2, 2, 9])).unwrap();
            assert_eq!(chosen.total_hit, 2);
        }
    }

    #[test]
    fn round_robin_ties_keep_incoming_order() {
        let chosen = select_link(Strategy::RoundRobin, links(&[5, 2, 2, 9])).unwrap();
        assert_eq!(chosen.id, 2);
    }

    #[test]
    fn single_link_is_always_chosen() {
        let chosen = select_link(Strategy::Random, links(&[7])).unwrap();
        assert_eq!(chosen.id, 1);
    }

    #[test]
    fn random_is_uniform_over_equal_links() {
        let draws = 10_000;
        let mut first = 0;
        for _ in 0..draws {
            if select_link(Strategy::Random, links(&[3, 3])).unwrap().id == 1 {
                first += 1;
            }
        }

        let share = first as f64 / draws as f64;
        assert!((0.45..=0.55).contains(&share), "share was {share}");
    }

    #[test]
    fn random_is_not_limited_to_least_used() {
        let mut seen_busy = false;
        for _ in 0..1_000 {
            if select_link(Strategy::Random, links(&[0, 100])).unwrap().id == 2 {
                seen_busy = true;
                break;
            }
        }
        assert!(seen_busy);
    }
}
