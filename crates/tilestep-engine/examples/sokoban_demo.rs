//! Headless puzzle demo: a player, boxes, walls and a bro on an ASCII map.
//!
//! Run with:
//!   cargo run --example sokoban_demo -p tilestep-engine -- ddsau
//!
//! Moves:
//!   w/a/s/d -- step up/left/down/right
//!   u       -- undo the last step
//!
//! Set `RUST_LOG=tilestep_engine=debug` to watch actions being accepted,
//! cancelled and rewound.

use tilestep_engine::prelude::*;

const LEVEL: &str = "\
#########
#@  .   #
# ## #  #
#  o  B #
#       #
#########";

/// Ticks per step; one move eases over about nine ticks at 60 Hz.
const SETTLE: u64 = 20;

// ---------------------------------------------------------------------------
// Level loading
// ---------------------------------------------------------------------------

fn kind_for(glyph: char) -> Option<ActLike> {
    match glyph {
        '@' => Some(ActLike::Player),
        'o' => Some(ActLike::Box),
        '#' => Some(ActLike::Wall),
        'B' => Some(ActLike::Bro),
        '>' => Some(ActLike::Airplane),
        _ => None,
    }
}

fn glyph_for(kind: ActLike) -> char {
    match kind {
        ActLike::Player => '@',
        ActLike::Box => 'o',
        ActLike::Wall => '#',
        ActLike::Bro => 'B',
        ActLike::Airplane => '>',
    }
}

/// Spawn every actor on the map. Returns the player.
fn load_level(tick_loop: &mut TickLoop, level: &str) -> Result<EntityId, anyhow::Error> {
    let mut player = None;
    for (y, row) in level.lines().enumerate() {
        for (x, glyph) in row.chars().enumerate() {
            let Some(kind) = kind_for(glyph) else {
                continue;
            };
            let entity = tick_loop.spawn_actor(kind, TilePoint::new(x as i32, y as i32))?;
            if kind == ActLike::Player {
                player = Some(entity);
            }
        }
    }
    player.ok_or_else(|| anyhow::anyhow!("level has no player"))
}

fn render(tick_loop: &TickLoop, width: usize, height: usize) -> String {
    let mut out = String::with_capacity((width + 1) * height);
    for y in 0..height {
        for x in 0..width {
            let tile = TilePoint::new(x as i32, y as i32);
            // Highest layer wins.
            let top = tick_loop
                .world()
                .tiles()
                .query_tile(tile)
                .filter_map(|e| {
                    let kind = *tick_loop.world().get::<ActLike>(e).ok()?;
                    let layer = tick_loop.world().get::<LayerId>(e).ok().copied();
                    Some((layer, kind))
                })
                .max_by_key(|(layer, _)| *layer);
            out.push(top.map_or('.', |(_, kind)| glyph_for(kind)));
        }
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let moves = std::env::args().nth(1).unwrap_or_else(|| "ddsdwu".to_owned());
    let width = LEVEL.lines().map(str::len).max().unwrap_or(0);
    let height = LEVEL.lines().count();

    let mut tick_loop = TickLoop::new(World::new(), TickConfig::default())?;
    let player = load_level(&mut tick_loop, LEVEL)?;
    println!("{}", render(&tick_loop, width, height));

    for key in moves.chars() {
        let (dx, dy) = match key {
            'w' => (0, -1),
            'a' => (-1, 0),
            's' => (0, 1),
            'd' => (1, 0),
            'u' => {
                match tick_loop.pop_undo_point() {
                    Ok(undone) => println!("undo: reversed {undone} action(s)"),
                    Err(EngineError::EmptyUndoStack) => println!("undo: nothing to undo"),
                    Err(err) => return Err(err.into()),
                }
                println!("{}", render(&tick_loop, width, height));
                continue;
            }
            other => {
                println!("ignoring '{other}'");
                continue;
            }
        };

        tick_loop.world_mut().set(player, MoveIntent::new(dx, dy))?;
        let completed = tick_loop.run_ticks(SETTLE)?;
        let diag = tick_loop.last_diagnostics();
        println!(
            "{key}: {completed} action(s) completed, undo depth {}, tick {} ({:?} last tick)",
            diag.undo_depth,
            tick_loop.tick_count(),
            diag.total_time
        );
        println!("{}", render(&tick_loop, width, height));
    }

    let snapshot = tick_loop.capture_snapshot()?;
    println!("final state hash: {}", snapshot.hash);
    Ok(())
}
