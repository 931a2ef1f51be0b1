use bevy::app::ScheduleRunnerPlugin;
use bevy::ecs::message::MessageWriter;
use bevy::prelude::*;
use bevy_soft_dynamics::prelude::*;
use std::time::Duration;

const START_HEIGHT: f32 = 10.0;

fn main() {
    println!("Starting Headless Soft-Body Simulation...");
    println!("A jelly cube free-falls for 300 physics ticks (5 seconds)...");

    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
            1.0 / 60.0,
        ))))
        .add_plugins(AssetPlugin::default())
        .init_asset::<Mesh>()
        .add_plugins(SoftDynamicsCorePlugin)
        // Skip mesh sync and debug plugins (headless)
        .add_systems(Startup, setup_simulation)
        .add_systems(Update, print_progress)
        .add_systems(FixedUpdate, check_body_status)
        .run();
}

fn setup_simulation(mut commands: Commands, mut spawns: MessageWriter<SpawnSoftBody>) {
    println!("\n[SETUP] Spawning test body...");

    #[rustfmt::skip]
    let positions = vec![
        0.0, 0.0, 0.0,
        1.0, 0.0, 0.0,
        1.0, 1.0, 0.0,
        0.0, 1.0, 0.0,
        0.0, 0.0, 1.0,
        1.0, 0.0, 1.0,
        1.0, 1.0, 1.0,
        0.0, 1.0, 1.0,
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1, 0, 3, 2,
        4, 5, 6, 4, 6, 7,
        0, 1, 5, 0, 5, 4,
        2, 3, 7, 2, 7, 6,
        1, 2, 6, 1, 6, 5,
        3, 0, 4, 3, 4, 7,
    ];
    spawns.write(
        SpawnSoftBody::from_buffers(positions, indices)
            .with_preset("Jelly")
            .with_transform(Transform::from_xyz(0.0, START_HEIGHT, 0.0)),
    );

    // Vacuum, so the free-fall checkpoint matches plain gravity
    commands.insert_resource(SoftDynamicsEnvironment {
        air_density: 0.0,
        ..Default::default()
    });
    commands.insert_resource(Time::<Fixed>::from_hz(60.0));
}

fn print_progress(time: Res<Time>, mut timer: Local<f32>) {
    *timer += time.delta_secs();
    if *timer > 1.0 {
        *timer = 0.0;
        println!(
            "[INFO] Simulation running... (Time: {:.1}s)",
            time.elapsed_secs()
        );
    }

    // Auto-quit after 5 seconds
    if time.elapsed_secs() > 5.0 {
        println!("[FINISHED] Simulation complete.");
        std::process::exit(0);
    }
}

#[derive(Default)]
struct Checkpoints {
    ticks: u32,
    drop_checked: bool,
    snapshot_checked: bool,
}

fn check_body_status(query: Query<&SoftBody>, mut checkpoints: Local<Checkpoints>) {
    let Ok(body) = query.single() else {
        return;
    };
    checkpoints.ticks += 1;

    // After one second of free fall the cube should have dropped ~5 m
    // while holding its shape
    if !checkpoints.drop_checked && checkpoints.ticks >= 60 {
        let mean_y = body.nodes.iter().map(|n| n.position.y).sum::<f32>() / body.nodes.len() as f32;
        let dropped = START_HEIGHT + 0.5 - mean_y;
        println!("[CHECKPOINT] Tick 60: dropped {dropped:.2}m");
        if dropped >= 4.5 && dropped <= 5.5 {
            println!("[PASS] Free-fall drop within expected range");
        } else {
            println!("[FAIL] Free-fall drop out of range ({dropped:.2}m)");
        }

        let max_strain = body
            .links
            .iter()
            .map(|link| {
                let a = body.nodes[link.nodes[0] as usize].position;
                let b = body.nodes[link.nodes[1] as usize].position;
                (a.distance(b) - link.rest_length).abs() / link.rest_length
            })
            .fold(0.0f32, f32::max);
        if max_strain < 0.05 {
            println!("[PASS] Shape held (max strain {max_strain:.4})");
        } else {
            println!("[FAIL] Body deformed in free fall (max strain {max_strain:.4})");
        }
        checkpoints.drop_checked = true;
    }

    // Snapshot round trip through the binary codec
    if !checkpoints.snapshot_checked && checkpoints.ticks >= 180 {
        match body.capture().to_bytes() {
            Ok(bytes) => match SoftBodySnapshot::from_bytes(&bytes) {
                Ok(snapshot) if snapshot.positions.len() == body.nodes.len() => {
                    println!("[PASS] Snapshot round trip ({} bytes)", bytes.len());
                }
                Ok(_) => println!("[FAIL] Snapshot lost nodes"),
                Err(error) => println!("[FAIL] Snapshot decode: {error}"),
            },
            Err(error) => println!("[FAIL] Snapshot encode: {error}"),
        }
        checkpoints.snapshot_checked = true;
    }
}
