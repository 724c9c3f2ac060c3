//! Headless auto-battle runner.
//!
//! Pits a small adventuring party against a band of goblins and an orc,
//! with both sides played by the built-in tactician, and prints the
//! narrated log.
//!
//! ```bash
//! RUST_LOG=autodm_core=debug cargo run -p autodm -- --seed 42 --rounds 20
//! ```

use autodm_core::character::{create_goblin, create_orc};
use autodm_core::items;
use autodm_core::{
    Battle, BattleConfig, BattleReport, CharacterBuilder, CharacterClass, Combatant,
    HeadlessBattle, PlainNarrator, RaceType, RngDice, Tactician,
};
use std::error::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    seed: Option<u64>,
    rounds: Option<u32>,
    json: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autodm=info,autodm_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    let args = parse_args(&args)?;

    let mut config = match &args.config {
        Some(path) => BattleConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => BattleConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(rounds) = args.rounds {
        config.max_rounds = Some(rounds);
    }
    tracing::info!(?config, "Starting battle");

    let battle = Battle::new(config.clone(), party(config.seed)?, monsters())?;
    let mut runner = HeadlessBattle::new(battle, Tactician::new(), Tactician::new(), PlainNarrator);
    let report = runner.run()?;

    if args.json {
        println!("{}", serde_json::to_string(&report.snapshot)?);
    } else {
        print_report(&report, &runner.battle().render_map());
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Args, Box<dyn Error>> {
    let mut parsed = Args::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => parsed.config = Some(value(&mut iter, arg)?.to_string()),
            "--seed" => parsed.seed = Some(value(&mut iter, arg)?.parse()?),
            "--rounds" => parsed.rounds = Some(value(&mut iter, arg)?.parse()?),
            "--json" => parsed.json = true,
            other => return Err(format!("unknown argument: {other} (try --help)").into()),
        }
    }
    Ok(parsed)
}

fn value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<&'a str, String> {
    iter.next()
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} needs a value"))
}

/// A level 3 fighter, wizard and cleric built from the standard array.
fn party(seed: Option<u64>) -> Result<Vec<Combatant>, Box<dyn Error>> {
    let mut dice = match seed {
        Some(seed) => RngDice::seeded(seed),
        None => RngDice::from_entropy(),
    };

    let fighter = CharacterBuilder::new()
        .name("Roland")
        .race(RaceType::Human)
        .class(CharacterClass::Fighter)
        .level(3)
        .equip(items::longsword())
        .equip(items::chain_shirt())
        .equip(items::shield())
        .carry(items::potion_of_healing())
        .build(&mut dice)?;
    let wizard = CharacterBuilder::new()
        .name("Elara")
        .race(RaceType::Elf)
        .class(CharacterClass::Wizard)
        .level(3)
        .equip(items::dagger())
        .build(&mut dice)?;
    let cleric = CharacterBuilder::new()
        .name("Mira")
        .race(RaceType::Dwarf)
        .class(CharacterClass::Cleric)
        .level(3)
        .equip(items::mace())
        .equip(items::scale_mail())
        .equip(items::shield())
        .build(&mut dice)?;

    Ok([fighter, wizard, cleric]
        .into_iter()
        .map(Combatant::player)
        .collect())
}

fn monsters() -> Vec<Combatant> {
    vec![
        Combatant::npc(create_goblin("Snag")),
        Combatant::npc(create_goblin("Grik")),
        Combatant::npc(create_goblin("Nub")),
        Combatant::npc(create_orc("Grul")),
    ]
}

fn print_report(report: &BattleReport, map: &str) {
    println!("=== Initiative ===");
    for entry in &report.initiative {
        println!(
            "  {:<8} {:>2} ({} {:+})",
            entry.name, entry.total, entry.roll, entry.modifier
        );
    }
    println!();

    let mut round = 0;
    for entry in &report.log {
        if entry.round != round {
            round = entry.round;
            println!("=== Round {round} ===");
        }
        println!("  {}", entry.narration);
    }
    println!();

    println!("=== Final positions ===");
    println!("{map}");
    println!();
    match report.outcome {
        Some(outcome) => println!("Outcome: {outcome} after {} rounds", report.rounds),
        None => println!("Outcome: no winner after {} rounds", report.rounds),
    }
    for combatant in &report.snapshot.combatants {
        let status = if combatant.alive { "standing" } else { "fallen" };
        println!(
            "  {} ({}): {}/{} HP, {status}",
            combatant.name, combatant.side, combatant.current_hp, combatant.max_hp
        );
    }
}

fn print_help() {
    println!("autodm - headless D&D 5e auto-battle");
    println!();
    println!("USAGE:");
    println!("  autodm [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help         Show this help message");
    println!("  --config <PATH>    Battle config as JSON (grid size, seed, round limit)");
    println!("  --seed <N>         Seed dice and placement for a repeatable battle");
    println!("  --rounds <N>       Stop after N rounds");
    println!("  --json             Print the final snapshot as JSON");
    println!();
    println!("Set RUST_LOG (e.g. RUST_LOG=autodm_core=debug) for engine logs.");
}
