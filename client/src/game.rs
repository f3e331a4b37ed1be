use log::{debug, info};
use shared::{
    Environment, KartSnapshot, Move, MovementSimulator, NetRole, NetworkedVehicle,
    ObserverBehavior, ObserverMode, PredictingBehavior, SnapshotSlot, TickOutcome, VehicleState,
    WorldClock,
};
use std::collections::HashMap;

/// One line of the periodic report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KartView {
    pub kart_id: u32,
    pub role: NetRole,
    pub state: VehicleState,
}

/// Every kart this client knows about, each in the role it plays here.
///
/// The kart matching `client_id` is predicted locally; every other kart is
/// observed. Vehicles are created the first time a snapshot mentions them.
pub struct ClientGameState {
    client_id: Option<u32>,
    env: Environment,
    simulator: MovementSimulator,
    observer_mode: ObserverMode,
    vehicles: HashMap<u32, NetworkedVehicle>,
    slots: HashMap<u32, SnapshotSlot>,
}

impl ClientGameState {
    pub fn new(env: Environment, observer_mode: ObserverMode) -> Self {
        Self {
            client_id: None,
            env,
            simulator: MovementSimulator::default(),
            observer_mode,
            vehicles: HashMap::new(),
            slots: HashMap::new(),
        }
    }

    pub fn set_client_id(&mut self, client_id: Option<u32>) {
        if self.client_id != client_id {
            self.reset();
        }
        self.client_id = client_id;
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn reset(&mut self) {
        self.vehicles.clear();
        self.slots.clear();
    }

    /// Routes each snapshot to its kart, once per distinct snapshot.
    pub fn apply_snapshots(&mut self, karts: &[KartSnapshot]) {
        let Self {
            client_id,
            env,
            simulator,
            observer_mode,
            vehicles,
            slots,
        } = self;

        for KartSnapshot { kart_id, snapshot } in karts {
            let slot = slots.entry(*kart_id).or_default();
            slot.deliver(*snapshot, |snapshot| {
                let vehicle = vehicles.entry(*kart_id).or_insert_with(|| {
                    if Some(*kart_id) == *client_id {
                        info!("Controlling kart {}", kart_id);
                        NetworkedVehicle::ControllingClient(PredictingBehavior::new(
                            *simulator,
                            snapshot.state,
                        ))
                    } else {
                        debug!("Observing kart {}", kart_id);
                        NetworkedVehicle::Observer(ObserverBehavior::new(*observer_mode, *simulator))
                    }
                });
                vehicle.on_snapshot(snapshot, env);
            });
        }
    }

    /// Advances every kart by one render tick. Returns the move to send for
    /// the controlled kart, if it exists yet.
    pub fn tick(&mut self, delta_time: f32, controls: (f32, f32), clock: &dyn WorldClock) -> Option<Move> {
        let mut outgoing = None;

        if let Some(own) = self.client_id.and_then(|id| self.vehicles.get_mut(&id)) {
            let (throttle, steering_throw) = controls;
            if let Err(e) = own.set_controls(throttle, steering_throw) {
                debug!("Controls not applied: {}", e);
            }
        }

        for vehicle in self.vehicles.values_mut() {
            if let TickOutcome::SendMove(kart_move) = vehicle.tick(delta_time, clock, &self.env) {
                outgoing = Some(kart_move);
            }
        }

        outgoing
    }

    pub fn controlled_state(&self) -> Option<VehicleState> {
        self.client_id
            .and_then(|id| self.vehicles.get(&id))
            .and_then(|vehicle| vehicle.rendered_state())
    }

    pub fn rendered_state(&self, kart_id: u32) -> Option<VehicleState> {
        self.vehicles.get(&kart_id).and_then(|v| v.rendered_state())
    }

    pub fn role_of(&self, kart_id: u32) -> Option<NetRole> {
        self.vehicles.get(&kart_id).map(|v| v.role())
    }

    /// Unconfirmed moves held for the controlled kart.
    pub fn pending_moves(&self) -> usize {
        match self.client_id.and_then(|id| self.vehicles.get(&id)) {
            Some(NetworkedVehicle::ControllingClient(predicting)) => predicting.ledger().len(),
            _ => 0,
        }
    }

    /// Current view of every kart that has something to render, ordered by id.
    pub fn views(&self) -> Vec<KartView> {
        let mut views: Vec<KartView> = self
            .vehicles
            .iter()
            .filter_map(|(kart_id, vehicle)| {
                vehicle.rendered_state().map(|state| KartView {
                    kart_id: *kart_id,
                    role: vehicle.role(),
                    state,
                })
            })
            .collect();
        views.sort_by_key(|v| v.kart_id);
        views
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }
}
