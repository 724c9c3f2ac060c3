//! Independent battles share nothing, so running them on separate threads
//! gives the same results as running them one after another.

use autodm_core::testing::{
    create_goblin, create_orc, create_sample_cleric, create_sample_fighter, create_sample_wizard,
};
use autodm_core::{
    Battle, BattleConfig, BattleOutcome, Combatant, HeadlessBattle, PlainNarrator, Tactician,
};

#[derive(Debug, PartialEq)]
struct Summary {
    outcome: Option<BattleOutcome>,
    rounds: u32,
    narration: Vec<String>,
}

fn run_seeded(seed: u64) -> Summary {
    let battle = Battle::new(
        BattleConfig::new().with_seed(seed).with_max_rounds(Some(50)),
        vec![
            Combatant::player(create_sample_fighter("Roland")),
            Combatant::player(create_sample_wizard("Elara")),
            Combatant::player(create_sample_cleric("Mira")),
        ],
        vec![
            Combatant::npc(create_goblin("Snag")),
            Combatant::npc(create_goblin("Grik")),
            Combatant::npc(create_orc("Grul")),
        ],
    )
    .expect("valid battle");
    let mut runner = HeadlessBattle::new(battle, Tactician::new(), Tactician::new(), PlainNarrator);
    let report = runner.run().expect("battle runs");
    Summary {
        outcome: report.outcome,
        rounds: report.rounds,
        narration: report.log.into_iter().map(|entry| entry.narration).collect(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_battles_match_sequential_replays() {
    let seeds: Vec<u64> = (1..=8).collect();

    let handles: Vec<_> = seeds
        .iter()
        .map(|&seed| tokio::task::spawn_blocking(move || run_seeded(seed)))
        .collect();
    let mut concurrent = Vec::new();
    for handle in handles {
        concurrent.push(handle.await.expect("battle task panicked"));
    }

    let sequential: Vec<Summary> = seeds.iter().map(|&seed| run_seeded(seed)).collect();
    assert_eq!(concurrent, sequential);
    for summary in &concurrent {
        assert!(!summary.narration.is_empty());
        assert!(summary.rounds >= 1);
    }
}

#[tokio::test]
async fn battles_can_move_between_tasks() {
    let battle = Battle::new(
        BattleConfig::new().with_seed(3),
        vec![Combatant::player(create_sample_fighter("Roland"))],
        vec![Combatant::npc(create_goblin("Snag"))],
    )
    .expect("valid battle");

    let report = tokio::task::spawn_blocking(move || {
        HeadlessBattle::new(battle, Tactician::new(), Tactician::new(), PlainNarrator).run()
    })
    .await
    .expect("battle task panicked")
    .expect("battle runs");
    assert!(report.outcome.is_some());
}
