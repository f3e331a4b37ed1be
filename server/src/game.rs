use glam::{Quat, Vec3};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    AuthorityBehavior, AuthoritativeSnapshot, Environment, KartSnapshot, Move, MovementSimulator,
    NetworkedVehicle, Pose, SnapshotSlot, TickOutcome, VehicleError, VehicleState, WorldClock,
};
use std::collections::HashMap;
use std::f32::consts::TAU;

/// Bot karts get ids from here up so they never collide with client ids.
pub const FIRST_BOT_ID: u32 = 1000;

/// Scripted input for a kart the authority drives itself.
#[derive(Debug, Clone, Copy)]
pub struct BotDriver {
    pub throttle: f32,
    pub steering_bias: f32,
    pub steering_amplitude: f32,
    pub period: f32,
    pub phase: f32,
}

impl BotDriver {
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            throttle: rng.gen_range(0.3..0.8),
            steering_bias: rng.gen_range(0.3..0.6),
            steering_amplitude: rng.gen_range(0.1..0.4),
            period: rng.gen_range(4.0..10.0),
            phase: rng.gen_range(0.0..TAU),
        }
    }

    /// Steering at `world_time`, always within full lock.
    pub fn steering_at(&self, world_time: f64) -> f32 {
        let angle = (world_time as f32 / self.period) * TAU + self.phase;
        (self.steering_bias + self.steering_amplitude * angle.sin()).clamp(-1.0, 1.0)
    }
}

/// Canonical state for every kart in the session.
pub struct GameState {
    pub tick: u64,
    env: Environment,
    simulator: MovementSimulator,
    clock_slack: f64,
    karts: HashMap<u32, NetworkedVehicle>,
    slots: HashMap<u32, SnapshotSlot>,
    bots: HashMap<u32, BotDriver>,
    next_bot_id: u32,
    rng: StdRng,
}

impl GameState {
    pub fn new(env: Environment, clock_slack: f64) -> Self {
        Self::with_rng(env, clock_slack, StdRng::from_entropy())
    }

    pub fn with_rng(env: Environment, clock_slack: f64, rng: StdRng) -> Self {
        Self {
            tick: 0,
            env,
            simulator: MovementSimulator::default(),
            clock_slack,
            karts: HashMap::new(),
            slots: HashMap::new(),
            bots: HashMap::new(),
            next_bot_id: FIRST_BOT_ID,
            rng,
        }
    }

    /// Starting pose for a kart: lined up along Y, facing +X.
    pub fn spawn_pose(kart_id: u32) -> Pose {
        let lane = (kart_id % 16) as f32;
        Pose::new(Vec3::new(0.0, -40.0 + lane * 5.0, 0.0), Quat::IDENTITY)
    }

    /// Spawns a kart for a remote client and returns its spawn snapshot.
    pub fn add_kart(&mut self, kart_id: u32, world_time: f64) -> AuthoritativeSnapshot {
        let spawn = VehicleState::at_rest(Self::spawn_pose(kart_id));
        let behavior = AuthorityBehavior::remote(self.simulator, spawn, world_time, self.clock_slack);
        self.insert(kart_id, behavior)
    }

    /// Spawns a kart the authority drives itself. Returns its id.
    pub fn add_bot(&mut self, world_time: f64) -> u32 {
        let kart_id = self.next_bot_id;
        self.next_bot_id += 1;

        let spawn = VehicleState::at_rest(Self::spawn_pose(kart_id));
        let driver = BotDriver::random(&mut self.rng);
        self.insert(
            kart_id,
            AuthorityBehavior::locally_driven(self.simulator, spawn, world_time),
        );
        self.bots.insert(kart_id, driver);

        debug!("Bot {} steering {:?}", kart_id, driver);
        kart_id
    }

    fn insert(&mut self, kart_id: u32, behavior: AuthorityBehavior) -> AuthoritativeSnapshot {
        let snapshot = *behavior.last_snapshot();
        let position = snapshot.state.pose.position;

        self.karts.insert(kart_id, NetworkedVehicle::Authority(behavior));
        let mut slot = SnapshotSlot::new();
        slot.publish(snapshot);
        self.slots.insert(kart_id, slot);

        info!(
            "Added kart {} at ({:.1}, {:.1})",
            kart_id, position.x, position.y
        );
        snapshot
    }

    pub fn remove_kart(&mut self, kart_id: &u32) {
        if self.karts.remove(kart_id).is_some() {
            self.slots.remove(kart_id);
            self.bots.remove(kart_id);
            info!("Removed kart {}", kart_id);
        }
    }

    /// Validates and simulates a move for `kart_id`, publishing the result.
    pub fn apply_move(
        &mut self,
        kart_id: u32,
        kart_move: &Move,
        world_time: f64,
    ) -> Result<AuthoritativeSnapshot, VehicleError> {
        let kart = self
            .karts
            .get_mut(&kart_id)
            .ok_or(VehicleError::UnknownVehicle(kart_id))?;

        let snapshot = kart.receive_move(kart_move, world_time, &self.env)?;
        if let Some(slot) = self.slots.get_mut(&kart_id) {
            slot.publish(snapshot);
        }
        Ok(snapshot)
    }

    /// Advances every kart the authority drives itself.
    pub fn tick(&mut self, delta_time: f32, clock: &dyn WorldClock) {
        let world_time = clock.server_time_seconds();

        for (kart_id, driver) in &self.bots {
            if let Some(kart) = self.karts.get_mut(kart_id) {
                let _ = kart.set_controls(driver.throttle, driver.steering_at(world_time));
            }
        }

        for (kart_id, kart) in self.karts.iter_mut() {
            if let TickOutcome::Publish(snapshot) = kart.tick(delta_time, clock, &self.env) {
                if let Some(slot) = self.slots.get_mut(kart_id) {
                    slot.publish(snapshot);
                }
            }
        }

        self.tick += 1;
    }

    /// Snapshots that changed since the last call, ordered by kart id.
    pub fn changed_snapshots(&mut self) -> Vec<KartSnapshot> {
        let mut changed: Vec<KartSnapshot> = self
            .slots
            .iter_mut()
            .filter_map(|(kart_id, slot)| {
                slot.take_changed().map(|snapshot| KartSnapshot {
                    kart_id: *kart_id,
                    snapshot,
                })
            })
            .collect();
        changed.sort_by_key(|k| k.kart_id);
        changed
    }

    /// Latest snapshot of every kart, for a client that just joined.
    pub fn all_snapshots(&self) -> Vec<KartSnapshot> {
        let mut all: Vec<KartSnapshot> = self
            .slots
            .iter()
            .filter_map(|(kart_id, slot)| {
                slot.latest().map(|snapshot| KartSnapshot {
                    kart_id: *kart_id,
                    snapshot: *snapshot,
                })
            })
            .collect();
        all.sort_by_key(|k| k.kart_id);
        all
    }

    pub fn kart_state(&self, kart_id: u32) -> Option<VehicleState> {
        self.karts.get(&kart_id).and_then(|kart| kart.rendered_state())
    }

    pub fn kart_count(&self) -> usize {
        self.karts.len()
    }

    pub fn bot_count(&self) -> usize {
        self.bots.len()
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{ManualClock, MoveRejection};

    fn game() -> GameState {
        GameState::with_rng(Environment::arena(), 0.0, StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_add_kart_publishes_spawn_snapshot() {
        let mut game = game();
        let spawn = game.add_kart(1, 2.5);

        assert_eq!(spawn.acknowledged_time(), 2.5);
        assert_eq!(spawn.state.velocity, Vec3::ZERO);

        let changed = game.changed_snapshots();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].kart_id, 1);
        assert!(game.changed_snapshots().is_empty());
        assert_eq!(game.all_snapshots().len(), 1);
    }

    #[test]
    fn test_spawn_poses_are_inside_arena() {
        for kart_id in [1, 2, 15, 16, FIRST_BOT_ID, FIRST_BOT_ID + 7] {
            let position = GameState::spawn_pose(kart_id).position;
            assert!(position.x.abs() < shared::ARENA_HALF_EXTENT);
            assert!(position.y.abs() < shared::ARENA_HALF_EXTENT);
        }
    }

    #[test]
    fn test_apply_move_simulates_and_publishes() {
        let mut game = game();
        game.add_kart(1, 0.0);
        game.changed_snapshots();

        let kart_move = Move::new(1.0, 0.0, 0.1, 0.1);
        let snapshot = game.apply_move(1, &kart_move, 1.0).unwrap();

        assert_approx_eq!(snapshot.state.velocity.x, 1.0, 1e-6);
        let changed = game.changed_snapshots();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].snapshot.last_move, kart_move);
    }

    #[test]
    fn test_apply_move_rejections() {
        let mut game = game();
        game.add_kart(1, 0.0);
        game.changed_snapshots();

        assert_eq!(
            game.apply_move(42, &Move::new(1.0, 0.0, 0.1, 0.1), 1.0),
            Err(VehicleError::UnknownVehicle(42))
        );
        assert!(matches!(
            game.apply_move(1, &Move::new(1.0, 0.0, 0.5, 0.1), 0.2),
            Err(VehicleError::Rejected(MoveRejection::RunningAhead { .. }))
        ));
        assert!(game.changed_snapshots().is_empty());
    }

    #[test]
    fn test_bots_drive_themselves() {
        let mut game = game();
        let mut clock = ManualClock::new(0.0);
        let bot = game.add_bot(0.0);
        game.changed_snapshots();

        for _ in 0..30 {
            clock.advance(1.0 / 60.0);
            game.tick(1.0 / 60.0, &clock);
        }

        assert_eq!(bot, FIRST_BOT_ID);
        assert_eq!(game.bot_count(), 1);
        assert_eq!(game.tick, 30);
        let state = game.kart_state(bot).unwrap();
        assert!(state.velocity.length() > 0.0);
        assert_eq!(game.changed_snapshots().len(), 1);
    }

    #[test]
    fn test_remote_karts_do_not_move_on_tick() {
        let mut game = game();
        let clock = ManualClock::new(1.0);
        game.add_kart(3, 0.0);
        let before = game.kart_state(3).unwrap();

        game.tick(0.1, &clock);

        assert_eq!(game.kart_state(3).unwrap(), before);
    }

    #[test]
    fn test_remove_kart() {
        let mut game = game();
        game.add_kart(1, 0.0);
        game.add_bot(0.0);
        assert_eq!(game.kart_count(), 2);

        game.remove_kart(&1);
        game.remove_kart(&FIRST_BOT_ID);
        game.remove_kart(&99);

        assert_eq!(game.kart_count(), 0);
        assert_eq!(game.bot_count(), 0);
        assert!(game.all_snapshots().is_empty());
    }

    #[test]
    fn test_bot_steering_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let driver = BotDriver::random(&mut rng);
            for t in 0..100 {
                let steering = driver.steering_at(t as f64 * 0.37);
                assert!((-1.0..=1.0).contains(&steering));
            }
        }
    }
}
