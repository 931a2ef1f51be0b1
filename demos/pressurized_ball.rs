//! A pressurized ball bouncing on the ground.

use avian3d::prelude::*;
use bevy::ecs::message::{MessageReader, MessageWriter};
use bevy::prelude::*;
use bevy_soft_dynamics::prelude::*;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(PhysicsPlugins::default())
        .add_plugins(SoftDynamicsPluginGroup)
        .add_systems(Startup, setup)
        .add_systems(Update, (handle_input, dress_new_bodies, update_ui))
        .run();
}

#[derive(Resource)]
struct BallMaterial(Handle<StandardMaterial>);

#[derive(Component)]
struct ContactCounter;

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut spawns: MessageWriter<SpawnSoftBody>,
) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(3.0, 2.5, 6.0).looking_at(Vec3::new(0.0, 1.0, 0.0), Vec3::Y),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 10000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.6, 0.3, 0.0)),
    ));

    // Bouncy ground
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(20.0, 20.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.35, 0.35, 0.4),
            ..default()
        })),
        RigidBody::Static,
        Collider::cuboid(20.0, 0.1, 20.0),
        SoftContactSurface {
            friction: 0.4,
            restitution: 0.6,
            feedback: 0.0,
        },
    ));

    commands.insert_resource(BallMaterial(materials.add(StandardMaterial {
        base_color: Color::srgb(0.2, 0.5, 0.9),
        perceptual_roughness: 0.2,
        ..default()
    })));

    let ball = meshes.add(Mesh::from(Sphere::new(0.6)));
    spawns.write(
        SpawnSoftBody::from_mesh(ball)
            .with_preset("Pressurized")
            .with_transform(Transform::from_xyz(0.0, 3.0, 0.0)),
    );

    commands.spawn((
        Text::new("Press SPACE to kick the ball\nContacts: 0"),
        TextFont {
            font_size: 24.0,
            ..default()
        },
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(10.0),
            left: Val::Px(10.0),
            ..default()
        },
        ContactCounter,
    ));
}

fn dress_new_bodies(
    mut commands: Commands,
    material: Res<BallMaterial>,
    query: Query<Entity, (With<SoftBody>, With<Mesh3d>, Without<MeshMaterial3d<StandardMaterial>>)>,
) {
    for entity in query.iter() {
        commands
            .entity(entity)
            .insert(MeshMaterial3d(material.0.clone()));
    }
}

fn handle_input(keyboard: Res<ButtonInput<KeyCode>>, mut query: Query<&mut SoftBody>) {
    if !keyboard.just_pressed(KeyCode::Space) {
        return;
    }
    for mut body in query.iter_mut() {
        body.wake();
        let kick = Vec3::new(0.0, 5.0, 0.0);
        for node in &mut body.nodes {
            if node.inv_mass > 0.0 {
                node.velocity += kick;
            }
        }
    }
}

fn update_ui(
    mut contacts: MessageReader<SoftBodyContact>,
    mut total: Local<u64>,
    mut ui_text: Query<&mut Text, With<ContactCounter>>,
) {
    let new_contacts = contacts.read().count() as u64;
    if new_contacts == 0 {
        return;
    }
    *total += new_contacts;
    for mut text in ui_text.iter_mut() {
        text.0 = format!("Press SPACE to kick the ball\nContacts: {}", *total);
    }
}
