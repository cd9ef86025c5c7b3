//! battle-runner: headless battle resolver.
//!
//! Usage:
//!   battle-runner --seed 12345 --turns 12 --db battle.db
//!   battle-runner --seed 12345 --forces lance.json --data-dir ./data
//!   battle-runner --seed 12345 --ipc-mode

use anyhow::Result;
use mechcombat_core::{
    commander::{AutoCommander, Commander},
    config::BattleConfig,
    declaration::Declaration,
    engine::{drive, Battle},
    hex::{Facing, HexCoord},
    phase::Phase,
    state::BattleOutcome,
    store::BattleStore,
    types::Side,
    unit::{Location, UnitSpec},
    GameEvent,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Declare { declaration: Declaration },
    /// Let the built-in commander declare for a side.
    Auto { side: Side },
    Advance,
    Quit,
}

#[derive(serde::Serialize)]
struct UiUnit {
    id:        String,
    side:      Side,
    position:  HexCoord,
    facing:    Facing,
    heat:      u32,
    armor:     u32,
    structure: u32,
    prone:     bool,
    shutdown:  bool,
    active:    bool,
}

#[derive(serde::Serialize)]
struct UiState {
    battle_id:    String,
    turn:         u32,
    phase:        Phase,
    side_to_move: Option<Side>,
    outcome:      Option<BattleOutcome>,
    units:        Vec<UiUnit>,
    events:       Vec<GameEvent>,
    error:        Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let turns = parse_arg(&args, "--turns", 0u32);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = string_arg(&args, "--data-dir");
    let forces_path = string_arg(&args, "--forces");
    let battle_id = string_arg(&args, "--battle-id")
        .map(str::to_string)
        .unwrap_or_else(|| format!("battle-{}", uuid::Uuid::new_v4()));

    let mut config = match data_dir {
        Some(dir) => BattleConfig::load(dir)?,
        None => BattleConfig::default_test(),
    };
    if turns > 0 {
        config = config.with_turn_limit(turns);
    }
    let forces: Vec<UnitSpec> = match forces_path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => demo_forces(),
    };

    if !ipc_mode {
        println!("battle-runner");
        println!("  battle_id: {battle_id}");
        println!("  seed:      {seed}");
        println!("  turns:     {}", config.turn_limit);
        println!("  db:        {db}");
        println!("  units:     {}", forces.len());
        println!();
    }

    let mut store = BattleStore::open(db)?;
    store.migrate()?;
    store.insert_battle(&battle_id, seed, config.turn_limit, env!("CARGO_PKG_VERSION"))?;

    let mut battle = Battle::new(&battle_id, seed, config, &forces)?;
    if ipc_mode {
        run_ipc_loop(&mut battle)?;
    } else {
        drive(&mut battle, &mut AutoCommander::new())?;
        print_summary(&battle);
    }

    store.append_events(&battle_id, battle.events())?;
    if let Some(outcome) = battle.outcome() {
        store.finish_battle(&battle_id, outcome)?;
    }
    log::info!("Stored {} events for {battle_id}", battle.events().len());
    Ok(())
}

/// Serve one JSON command per stdin line, answering each with the
/// battle state and the events it produced.
fn run_ipc_loop(battle: &mut Battle) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();
    let mut auto = AutoCommander::new();

    loop {
        buffer.clear();
        if handle.read_line(&mut buffer)? == 0 {
            break;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        let seen = battle.events().len();
        let error = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => None,
            IpcCommand::Declare { declaration } => battle.apply_declaration(declaration).err(),
            IpcCommand::Auto { side } => auto_declare(battle, &mut auto, side).err(),
            IpcCommand::Advance => battle.advance_phase().err(),
        };
        if let Some(e) = &error {
            if e.is_invariant_violation() {
                return Err(anyhow::anyhow!("battle corrupted: {e}"));
            }
        }
        let state = ui_state(battle, seen, error.map(|e| e.to_string()));
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn auto_declare(battle: &mut Battle, auto: &mut AutoCommander, side: Side) -> mechcombat_core::SimResult<()> {
    let declarations = match battle.phase() {
        Phase::Movement => auto.next_move(battle.state(), battle.config(), side).into_iter().collect(),
        _ => auto.attacks(battle.state(), battle.config(), side),
    };
    for declaration in declarations {
        battle.apply_declaration(declaration)?;
    }
    Ok(())
}

fn ui_state(battle: &Battle, since: usize, error: Option<String>) -> UiState {
    let state = battle.state();
    UiState {
        battle_id:    state.battle_id.clone(),
        turn:         state.clock.turn,
        phase:        state.clock.phase,
        side_to_move: state.clock.side_to_move(),
        outcome:      state.outcome.clone(),
        units:        state
            .units
            .values()
            .map(|u| UiUnit {
                id:        u.id.clone(),
                side:      u.side,
                position:  u.position,
                facing:    u.facing,
                heat:      u.heat,
                armor:     u.total_armor(),
                structure: u.total_structure(),
                prone:     u.prone,
                shutdown:  u.shutdown,
                active:    u.is_active(),
            })
            .collect(),
        events:       battle.events()[since..].to_vec(),
        error,
    }
}

fn print_summary(battle: &Battle) {
    let state = battle.state();
    println!("=== BATTLE SUMMARY ===");
    println!("  battle_id:  {}", state.battle_id);
    println!("  turns:      {}", state.clock.turn);
    println!("  events:     {}", battle.events().len());
    match battle.outcome() {
        Some(o) => println!("  outcome:    {:?}, winner {:?}", o.reason, o.winner),
        None => println!("  outcome:    (unfinished)"),
    }
    println!();
    println!("=== UNITS ===");
    for u in state.units.values() {
        let status = match (&u.destroyed, u.withdrawn) {
            (Some(cause), _) => format!("destroyed ({cause:?})"),
            (None, true) => "withdrawn".to_string(),
            (None, false) => "operational".to_string(),
        };
        println!(
            "  {:<8} side {}  armor {:>3}  structure {:>3}  heat {:>2}  {status}",
            u.id,
            u.side,
            u.total_armor(),
            u.total_structure(),
            u.heat
        );
    }
}

/// Two medium mechs a side, facing each other across twelve hexes.
fn demo_forces() -> Vec<UnitSpec> {
    let brawler = |id: &str, side: Side, q: i32, r: i32, facing: Facing| {
        UnitSpec::biped(id, side, 50, 5)
            .at(HexCoord::new(q, r), facing)
            .with_weapon("medium_laser", Location::RightArm)
            .with_weapon("medium_laser", Location::LeftArm)
            .with_weapon("srm4", Location::RightTorso)
            .with_ammo("srm4_ammo", Location::RightTorso)
    };
    let gunner = |id: &str, side: Side, q: i32, r: i32, facing: Facing| {
        UnitSpec::biped(id, side, 55, 5)
            .at(HexCoord::new(q, r), facing)
            .with_weapon("ac10", Location::RightTorso)
            .with_ammo("ac10_ammo", Location::LeftTorso)
            .with_weapon("medium_laser", Location::CenterTorso)
    };
    vec![
        brawler("alpha-1", 0, 0, 0, Facing::NORTH),
        gunner("alpha-2", 0, 2, -1, Facing::NORTH),
        brawler("bravo-1", 1, 0, -12, Facing::SOUTH),
        gunner("bravo-2", 1, 2, -13, Facing::SOUTH),
    ]
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
