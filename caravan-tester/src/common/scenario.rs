//! Named end-to-end runs against the core simulation.
use anyhow::{Context, Result, bail, ensure};
use caravan_game::{
    CaravanEngine, Catalog, ContentError, ContentLoader, EmbeddedContent, EncounterOutcome,
    EncounterRoll, GameSession, SimConfig, TransportMode, TravelConfig, World,
};
use std::time::Duration;

/// Upper bound on simulated time any scenario waits for an arrival.
const MAX_JOURNEY_HOURS: u64 = 72;

type ScenarioFn = fn(u64) -> Result<()>;

#[derive(Debug, Clone, Copy)]
pub struct TestScenario {
    pub name: &'static str,
    pub description: &'static str,
    run: ScenarioFn,
}

impl TestScenario {
    /// Run one seeded iteration.
    ///
    /// # Errors
    ///
    /// Returns the first expectation that did not hold.
    pub fn run(&self, seed: u64) -> Result<()> {
        (self.run)(seed)
    }
}

const SCENARIOS: &[TestScenario] = &[
    TestScenario {
        name: "smoke",
        description: "Create a session, plan a trip and advance an hour",
        run: smoke,
    },
    TestScenario {
        name: "travel-arrival",
        description: "Walk to Harrowgate with encounters enabled and arrive",
        run: travel_arrival,
    },
    TestScenario {
        name: "bandit-pressure",
        description: "Encounter every tick; gold never goes negative",
        run: bandit_pressure,
    },
    TestScenario {
        name: "gather-yield",
        description: "Mine iron and quarry stone as the node depletes; yields stay in range",
        run: gather_yield,
    },
    TestScenario {
        name: "craft-queue",
        description: "Smelt bars in Harrowgate; units finish in order",
        run: craft_queue,
    },
    TestScenario {
        name: "buff-refresh",
        description: "Eat twice; the stamina buff refreshes instead of stacking",
        run: buff_refresh,
    },
    TestScenario {
        name: "deterministic-replay",
        description: "Same seed and actions give the same state digest",
        run: deterministic_replay,
    },
];

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    SCENARIOS
        .iter()
        .map(|scenario| (scenario.name, scenario.description))
        .collect()
}

#[must_use]
pub fn get_scenario(name: &str) -> Option<TestScenario> {
    SCENARIOS
        .iter()
        .find(|scenario| scenario.name == name)
        .copied()
}

#[must_use]
pub fn all_scenario_names() -> Vec<String> {
    SCENARIOS.iter().map(|s| s.name.to_string()).collect()
}

/// Bundled content with a travel override.
struct TunedContent {
    travel: TravelConfig,
}

impl ContentLoader for TunedContent {
    type Error = ContentError;

    fn load_world(&self) -> Result<World, Self::Error> {
        EmbeddedContent.load_world()
    }

    fn load_catalog(&self) -> Result<Catalog, Self::Error> {
        EmbeddedContent.load_catalog()
    }

    fn load_config(&self) -> Result<SimConfig, Self::Error> {
        Ok(SimConfig {
            travel: self.travel.clone(),
            ..SimConfig::default()
        })
    }
}

fn session(seed: u64) -> Result<GameSession> {
    CaravanEngine::new(EmbeddedContent).create_session(seed)
}

fn quiet_session(seed: u64) -> Result<GameSession> {
    CaravanEngine::new(TunedContent {
        travel: TravelConfig::without_encounters(),
    })
    .create_session(seed)
}

fn travel_to(game: &mut GameSession, destination: &str) -> Result<()> {
    game.start_travel(destination)
        .with_context(|| format!("departing for {destination}"))?;
    for _ in 0..MAX_JOURNEY_HOURS * 60 {
        if !game.travel().is_traveling() {
            break;
        }
        game.advance(Duration::from_secs(60));
    }
    ensure!(
        game.travel().current_location() == Some(destination),
        "never reached {destination}"
    );
    Ok(())
}

fn smoke(seed: u64) -> Result<()> {
    let mut game = session(seed)?;
    let plan = game.plan_to("harrowgate")?;
    ensure!(plan.duration_minutes > 0.0, "empty plan to harrowgate");
    game.start_travel("harrowgate")?;
    let report = game.advance(Duration::from_secs(3_600));
    ensure!(report.travel_ticks == 60, "expected 60 travel ticks, got {}", report.travel_ticks);
    Ok(())
}

fn travel_arrival(seed: u64) -> Result<()> {
    let mut game = session(seed)?;
    game.inventory().borrow_mut().add_gold(200);
    game.set_transport(TransportMode::Cart)?;
    travel_to(&mut game, "harrowgate")?;
    let history = game.travel().history();
    ensure!(history.len() == 1, "expected one travel record");
    ensure!(history[0].from == "millbrook", "trip began at {}", history[0].from);
    Ok(())
}

fn bandit_pressure(seed: u64) -> Result<()> {
    let mut game = CaravanEngine::new(TunedContent {
        travel: TravelConfig {
            encounter: EncounterRoll::PerTick { chance: 1.0 },
            ..TravelConfig::default()
        },
    })
    .create_session(seed)?;
    game.inventory().borrow_mut().add_gold(30);
    game.start_travel("ashford")?;
    let mut taken = 0;
    for _ in 0..MAX_JOURNEY_HOURS * 60 {
        if !game.travel().is_traveling() {
            break;
        }
        let report = game.advance(Duration::from_secs(60));
        for encounter in report.encounters {
            if let EncounterOutcome::Robbed { demanded, lost } = encounter.outcome {
                ensure!(lost <= demanded, "bandits took {lost} of {demanded}");
                taken += lost;
            }
        }
    }
    ensure!(taken <= 30, "lost {taken} gold from a purse of 30");
    ensure!(game.inventory().borrow().gold() == 30 - taken, "gold ledger drifted");
    Ok(())
}

fn gather_yield(seed: u64) -> Result<()> {
    let mut game = quiet_session(seed)?;
    game.inventory().borrow_mut().add_item("bronze_pickaxe", 1);
    game.equip_item("bronze_pickaxe")?;
    travel_to(&mut game, "iron_hills")?;
    for action in ["mine_iron", "quarry_stone"].into_iter().cycle().take(12) {
        let task = game.start_gathering(action)?;
        let report = game.advance(Duration::from_secs(30));
        let Some(gathered) = report.gathered.first() else {
            bail!("gather of {} never completed", task.action_id);
        };
        ensure!(
            task.yield_range.contains(gathered.quantity),
            "yield {} outside {:?}",
            gathered.quantity,
            task.yield_range
        );
    }
    Ok(())
}

fn craft_queue(seed: u64) -> Result<()> {
    let mut game = quiet_session(seed)?;
    travel_to(&mut game, "harrowgate")?;
    game.inventory().borrow_mut().add_item("iron_ore", 6);
    let entry = game.add_to_queue("smelt_iron_bar", 3, "smelter")?;
    let report = game.advance(Duration::from_secs(30));
    let completed: Vec<u32> = report
        .crafted
        .iter()
        .filter(|unit| unit.entry_id == entry)
        .map(|unit| unit.completed)
        .collect();
    ensure!(completed == [1, 2, 3], "units finished as {completed:?}");
    ensure!(
        game.inventory().borrow().item_count("iron_bar") == 3,
        "missing iron bars"
    );
    Ok(())
}

fn buff_refresh(seed: u64) -> Result<()> {
    let mut game = session(seed)?;
    game.inventory().borrow_mut().add_item("cooked_fish", 2);
    game.use_consumable("cooked_fish")?;
    game.advance(Duration::from_secs(60));
    game.use_consumable("cooked_fish")?;
    ensure!(game.scheduler().buffs().len() == 1, "buffs stacked");
    Ok(())
}

fn deterministic_replay(seed: u64) -> Result<()> {
    let run = || -> Result<u64> {
        let mut game = session(seed)?;
        game.inventory().borrow_mut().add_gold(120);
        game.start_travel("fenwick")?;
        game.advance(Duration::from_secs(4 * 3_600));
        Ok(game.state_digest())
    };
    let first = run()?;
    let second = run()?;
    ensure!(first == second, "digests differ: {first:#x} vs {second:#x}");
    Ok(())
}
