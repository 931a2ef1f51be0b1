//! Falling cloth demo: a sheet pinned along one edge swings down under
//! gravity and flutters in the wind. The cloth is spawned from raw buffers,
//! so it has no render mesh and draws through the debug gizmos instead.
//!
//! Controls:
//! - Space: toggle wind
//! - D: toggle cloth drawing

use avian3d::prelude::*;
use bevy::ecs::message::MessageWriter;
use bevy::prelude::*;
use bevy_soft_dynamics::prelude::*;

/// Nodes per cloth side.
const CLOTH_SIZE: usize = 20;

/// Rest distance between neighboring nodes (m).
const CLOTH_SPACING: f32 = 0.1;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(PhysicsPlugins::default())
        .add_plugins(SoftDynamicsPluginGroup)
        .insert_resource(SoftDynamicsConfig {
            debug_draw: true,
            ..Default::default()
        })
        .add_systems(Startup, setup)
        .add_systems(Update, handle_input)
        .run();
}

/// Flat sheet in the XZ plane, centered on the origin.
fn cloth_buffers() -> (Vec<f32>, Vec<u32>) {
    let half = (CLOTH_SIZE - 1) as f32 * CLOTH_SPACING * 0.5;
    let mut positions = Vec::with_capacity(CLOTH_SIZE * CLOTH_SIZE * 3);
    for row in 0..CLOTH_SIZE {
        for col in 0..CLOTH_SIZE {
            positions.push(col as f32 * CLOTH_SPACING - half);
            positions.push(0.0);
            positions.push(row as f32 * CLOTH_SPACING - half);
        }
    }

    let mut indices = Vec::new();
    for row in 0..CLOTH_SIZE - 1 {
        for col in 0..CLOTH_SIZE - 1 {
            let a = (row * CLOTH_SIZE + col) as u32;
            let b = a + 1;
            let d = a + CLOTH_SIZE as u32;
            let e = d + 1;
            indices.extend_from_slice(&[a, d, b, b, d, e]);
        }
    }
    (positions, indices)
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
        Transform::from_xyz(2.5, 2.5, 4.5).looking_at(Vec3::new(0.0, 1.5, 0.0), Vec3::Y),
    ));

    // Light
    commands.spawn((
        DirectionalLight {
            illuminance: 10_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(6.0, 10.0, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Ground
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(12.0, 12.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.35, 0.4, 0.35),
            ..default()
        })),
        Transform::from_xyz(0.0, -0.05, 0.0),
        RigidBody::Static,
        Collider::cuboid(12.0, 0.1, 12.0),
        SoftContactSurface {
            friction: 0.9,
            restitution: 0.0,
            feedback: 0.0,
        },
    ));

    // The sheet starts horizontal; the pinned far edge becomes the top edge
    // once it swings down.
    let (positions, indices) = cloth_buffers();
    spawns.write(
        SpawnSoftBody::from_buffers(positions, indices)
            .with_preset("Cloth")
            .with_pinned_side(Vec3::Z)
            .with_transform(Transform::from_xyz(0.0, 2.5, 0.0)),
    );

    // UI
    commands.spawn((
        Text::new("Falling Cloth\nSpace: toggle wind\nD: toggle cloth drawing"),
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

fn handle_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut environment: ResMut<SoftDynamicsEnvironment>,
    mut config: ResMut<SoftDynamicsConfig>,
    mut bodies: Query<&mut SoftBody>,
) {
    if keyboard.just_pressed(KeyCode::Space) {
        if environment.wind == Vec3::ZERO {
            environment.wind = Vec3::new(2.5, 0.0, 1.0);
            environment.turbulence = 1.2;
            // A cloth that dozed off would never feel the gust
            for mut body in &mut bodies {
                body.wake();
            }
        } else {
            environment.wind = Vec3::ZERO;
            environment.turbulence = 0.0;
        }
    }
    if keyboard.just_pressed(KeyCode::KeyD) {
        config.debug_draw = !config.debug_draw;
    }
}
