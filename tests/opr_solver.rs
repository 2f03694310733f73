use std::collections::{BTreeMap, BTreeSet};

use contrib_index::corpus::{Match, PhaseTotals, TeamId};
use contrib_index::opr::{OprConfig, solve_opr};

fn teleop_only(key: &str, red: &[u32], blue: &[u32], r: f64, b: f64) -> Match {
    Match::qualifying(
        key,
        red,
        blue,
        PhaseTotals::new(0.0, r),
        PhaseTotals::new(0.0, b),
    )
}

fn impact(lambda: f64) -> OprConfig {
    OprConfig {
        lambda,
        non_negative: false,
    }
}

/// Deterministic 12-team schedule with known per-team strengths.
fn round_robin_corpus(n_matches: usize) -> Vec<Match> {
    let strength = |t: u32| (2.0 + t as f64 * 0.5, 5.0 + t as f64 * 1.5);
    let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut out = Vec::with_capacity(n_matches);
    for i in 0..n_matches {
        let mut pool: Vec<u32> = (1..=12).collect();
        for j in (1..pool.len()).rev() {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let k = (seed >> 33) as usize % (j + 1);
            pool.swap(j, k);
        }
        let red = &pool[0..3];
        let blue = &pool[3..6];
        let noise = ((i * 37) % 7) as f64 - 3.0;
        let sum = |ts: &[u32]| {
            ts.iter().fold((0.0, 0.0), |acc, t| {
                let s = strength(*t);
                (acc.0 + s.0, acc.1 + s.1)
            })
        };
        let (ra, rt) = sum(red);
        let (ba, bt) = sum(blue);
        out.push(Match::qualifying(
            format!("qm{}", i + 1),
            red,
            blue,
            PhaseTotals::new(ra, rt + noise),
            PhaseTotals::new(ba, bt - noise),
        ));
    }
    out
}

#[test]
fn disjoint_alliances_reproduce_average_share() {
    let matches = vec![
        Match::qualifying(
            "qm1",
            &[1, 2, 3],
            &[4, 5, 6],
            PhaseTotals::new(6.0, 30.0),
            PhaseTotals::new(3.0, 24.0),
        ),
        Match::qualifying(
            "qm2",
            &[7, 8],
            &[9, 10, 11],
            PhaseTotals::new(4.0, 10.0),
            PhaseTotals::new(9.0, 33.0),
        ),
    ];
    let res = solve_opr(&matches, &BTreeSet::new(), impact(1e-6)).expect("fit");

    let expect = |team: u32, auto: f64, teleop: f64| {
        let r = res.get(TeamId(team));
        assert!((r.auto_opr - auto).abs() < 1e-4, "team {team} auto {}", r.auto_opr);
        assert!((r.teleop_opr - teleop).abs() < 1e-4, "team {team} teleop {}", r.teleop_opr);
        assert!((r.total_opr - (auto + teleop)).abs() < 1e-4);
    };
    expect(1, 2.0, 10.0);
    expect(5, 1.0, 8.0);
    expect(8, 2.0, 5.0);
    expect(11, 3.0, 11.0);
}

#[test]
fn partners_that_always_share_an_alliance_split_credit_evenly() {
    let matches = vec![
        teleop_only("qm1", &[1, 2, 3], &[4, 5, 6], 30.0, 25.0),
        teleop_only("qm2", &[1, 2, 3], &[4, 5, 6], 36.0, 28.0),
        teleop_only("qm3", &[1, 2, 3], &[4, 5, 6], 33.0, 26.0),
    ];
    let res = solve_opr(&matches, &BTreeSet::new(), impact(1.0)).expect("fit");

    let red: Vec<f64> = [1, 2, 3]
        .iter()
        .map(|t| res.get(TeamId(*t)).teleop_opr)
        .collect();
    assert!((red[0] - red[1]).abs() < 1e-9);
    assert!((red[1] - red[2]).abs() < 1e-9);
    // (3·J + I) x = 99 · 1  =>  x = 9.9
    assert!((red[0] - 9.9).abs() < 1e-9);
    assert!((res.get(TeamId(4)).teleop_opr - 7.9).abs() < 1e-9);
    assert_eq!(res.get(TeamId(1)).auto_opr, 0.0);
}

#[test]
fn larger_lambda_shrinks_ratings() {
    let matches = round_robin_corpus(30);
    let mut prev = f64::INFINITY;
    for lambda in [0.1, 0.5, 1.0, 5.0, 20.0, 100.0] {
        let norm = solve_opr(&matches, &BTreeSet::new(), impact(lambda))
            .expect("fit")
            .norm();
        assert!(norm <= prev + 1e-9, "lambda {lambda}: {norm} > {prev}");
        prev = norm;
    }
}

#[test]
fn well_sampled_corpus_recovers_strength_order() {
    let matches = round_robin_corpus(60);
    let res = solve_opr(&matches, &BTreeSet::new(), impact(0.5)).expect("fit");
    assert!(res.get(TeamId(12)).total_opr > res.get(TeamId(1)).total_opr);
    assert!(!res.degraded);
}

#[test]
fn production_mode_clamps_negative_ratings() {
    // Exactly determined: x1 = 25, x2 = -5, x3 = 10.
    let matches = vec![
        teleop_only("qm1", &[1, 2], &[3], 20.0, 10.0),
        teleop_only("qm2", &[1], &[2, 3], 25.0, 5.0),
    ];

    let signed = solve_opr(&matches, &BTreeSet::new(), impact(1e-6)).expect("fit");
    assert!(signed.get(TeamId(2)).total_opr < -4.9);
    assert!(signed.by_team.values().any(|r| r.total_opr < 0.0));

    let clamped = solve_opr(
        &matches,
        &BTreeSet::new(),
        OprConfig {
            lambda: 1e-6,
            non_negative: true,
        },
    )
    .expect("fit");
    assert!(clamped.by_team.values().all(|r| r.total_opr >= 0.0));
    assert_eq!(clamped.get(TeamId(2)).total_opr, 0.0);
    assert!((clamped.get(TeamId(1)).total_opr - 25.0).abs() < 1e-3);
}

#[test]
fn matches_played_matches_manual_tally_in_both_modes() {
    let matches = round_robin_corpus(25);
    let mut tally: BTreeMap<TeamId, u32> = BTreeMap::new();
    for m in &matches {
        for t in m.red.iter().chain(m.blue.iter()) {
            *tally.entry(*t).or_default() += 1;
        }
    }

    for non_negative in [false, true] {
        let res = solve_opr(
            &matches,
            &BTreeSet::new(),
            OprConfig {
                lambda: 3.0,
                non_negative,
            },
        )
        .expect("fit");
        for (team, n) in &tally {
            assert_eq!(res.get(*team).matches_played, *n, "team {team}");
        }
    }
}
