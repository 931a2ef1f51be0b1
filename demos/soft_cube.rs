//! Soft cube demo: three pressurized jelly cubes of increasing mass drop
//! onto a bouncy floor, then rigid balls rain down on them.
//!
//! Controls:
//! - Space: drop another ball volley
//! - D: toggle debug gizmos

use avian3d::prelude::*;
use bevy::ecs::message::MessageWriter;
use bevy::prelude::*;
use bevy_soft_dynamics::prelude::*;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(PhysicsPlugins::default())
        .add_plugins(SoftDynamicsPluginGroup)
        .add_systems(Startup, setup)
        .add_systems(Update, (rain_balls_once, handle_input))
        .run();
}

/// Shared assets for the rigid balls dropped onto the cubes.
#[derive(Resource)]
struct BallAssets {
    mesh: Handle<Mesh>,
    material: Handle<StandardMaterial>,
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut spawns: MessageWriter<SpawnSoftBody>,
) {
    // Camera
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(5.0, 5.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Light
    commands.spawn((
        DirectionalLight {
            illuminance: 10_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(8.0, 16.0, 8.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Bouncy ground
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(40.0, 40.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.35, 0.4, 0.35),
            ..default()
        })),
        Transform::from_xyz(0.0, -0.05, 0.0),
        RigidBody::Static,
        Collider::cuboid(40.0, 0.1, 40.0),
        SoftContactSurface {
            friction: 0.5,
            restitution: 0.7,
            feedback: 0.0,
        },
    ));

    // Heavier cubes get more internal pressure, like balloons pumped harder
    let cubes = [
        (-3.0, 10.0, 100.0, Color::srgb(0.9, 0.4, 0.3)),
        (0.0, 50.0, 800.0, Color::srgb(0.4, 0.7, 0.9)),
        (3.0, 100.0, 2000.0, Color::srgb(0.9, 0.8, 0.3)),
    ];
    for (x, mass, pressure, color) in cubes {
        let mesh = meshes.add(Mesh::from(Cuboid::new(1.0, 1.0, 1.0)));
        let target = commands
            .spawn(MeshMaterial3d(materials.add(StandardMaterial {
                base_color: color,
                perceptual_roughness: 1.0,
                ..default()
            })))
            .id();
        spawns.write(
            SpawnSoftBody::from_mesh(mesh)
                .with_target(target)
                .with_preset("Jelly")
                .with_material(SoftBodyMaterial::new(0.09, 0.09, 1.0))
                .with_settings(
                    SoftBodySettings::default()
                        .with_position_iterations(30)
                        .with_velocity_iterations(30)
                        .with_pressure(pressure)
                        .with_margin(0.05)
                        .with_collision(CollisionFlags::WORLD | CollisionFlags::SOFT_BODY)
                        .with_sleep(false),
                )
                .with_total_mass(mass)
                .with_transform(Transform::from_xyz(x, 3.0, 0.0)),
        );
    }

    commands.insert_resource(BallAssets {
        mesh: meshes.add(Sphere::new(0.5)),
        material: materials.add(StandardMaterial {
            base_color: Color::srgb(0.8, 0.8, 0.85),
            ..default()
        }),
    });

    // UI
    commands.spawn((
        Text::new("Soft Cubes\nSpace: drop balls\nD: toggle debug draw"),
        TextFont {
            font_size: 20.0,
            ..default()
        },
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(12.0),
            left: Val::Px(12.0),
            ..default()
        },
    ));
}

/// One volley lands automatically a second in, like the original scene.
fn rain_balls_once(
    mut done: Local<bool>,
    time: Res<Time>,
    mut commands: Commands,
    assets: Res<BallAssets>,
) {
    if *done || time.elapsed_secs() < 1.0 {
        return;
    }
    *done = true;
    spawn_ball_volley(&mut commands, &assets);
}

fn spawn_ball_volley(commands: &mut Commands, assets: &BallAssets) {
    for i in 0..15 {
        commands.spawn((
            Mesh3d(assets.mesh.clone()),
            MeshMaterial3d(assets.material.clone()),
            Transform::from_xyz(i as f32 - 7.0, 10.0, 0.0),
            RigidBody::Dynamic,
            Collider::sphere(0.5),
            SoftContactSurface {
                friction: 0.3,
                restitution: 0.5,
                feedback: 1.0,
            },
        ));
    }
}

fn handle_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut commands: Commands,
    assets: Res<BallAssets>,
    mut config: ResMut<SoftDynamicsConfig>,
) {
    if keyboard.just_pressed(KeyCode::Space) {
        spawn_ball_volley(&mut commands, &assets);
    }
    if keyboard.just_pressed(KeyCode::KeyD) {
        config.debug_draw = !config.debug_draw;
    }
}
