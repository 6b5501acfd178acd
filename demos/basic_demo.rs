//! Basic demonstration of the Warfront simulation.
//!
//! Run with: cargo run --example basic_demo
//! Set `RUST_LOG=warfront=debug` to see simulation events.

use warfront_sim::{PlayerId, SimWorld, Snapshot, StructureKind, Tier};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Warfront - Simulation Demo ===\n");

    let mut sim = SimWorld::skirmish(42);

    // First tick founds both headquarters
    sim.tick(0.1);
    println!("Initial state:");
    print_snapshot(&sim.snapshot());

    if let Some(hq) = sim.snapshot().headquarters_of(PlayerId(1)) {
        let (x, y) = (hq.x + 3.0, hq.y);
        if let Err(err) = sim.register_structure(PlayerId(1), StructureKind::Factory, Tier(1), x, y) {
            println!("factory rejected: {err}");
        }
    }
    let _ = sim.set_stance(PlayerId(1), 0.2);

    // Run simulation for 600 ticks (60 seconds at 10 ticks/sec)
    println!("\nRunning simulation for 600 ticks...\n");
    for tick in 0..600 {
        sim.tick(0.1);

        if tick == 200 {
            println!("--- P1 sends half its army at P2 ---");
            if let Err(err) = sim.queue_attack_order(PlayerId(1), Some(PlayerId(2)), 0.5) {
                println!("order rejected: {err}");
            }
        }

        if (tick + 1) % 100 == 0 {
            println!("--- Tick {} (t={:.1}s) ---", sim.current_tick(), sim.current_time());
            print_snapshot(&sim.snapshot());
            for player in [PlayerId(1), PlayerId(2)] {
                let tiles = sim.territory().map().tiles_owned_by(player).len();
                println!("  {player}: {tiles} tiles, stance {:.2}", sim.stance(player));
            }
        }
    }

    println!("\n=== Final State (JSON) ===\n");
    match sim.snapshot().to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(err) => println!("snapshot failed: {err}"),
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    for player in [PlayerId(1), PlayerId(2)] {
        let units: Vec<_> = snapshot.units_of(player).collect();
        let health: f32 = units.iter().map(|u| u.health).sum();
        println!(
            "  {player}: {} units, total hp={:.0}, defeated={}",
            units.len(),
            health,
            snapshot.defeated.contains(&player)
        );
    }
    println!("  projectiles in flight: {}", snapshot.projectiles.len());
}
