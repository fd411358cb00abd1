// Round manager: the safe-colour state machine that drives the whole game.
//
//   NotStarted ─start_delay─▶ SelectingColor ─▶ Warning ─▶ Dropping ─▶ WaitingRegeneration
//                                  ▲                                          │
//                                  └──────── all tiles standing again ────────┘
//
// `RoundManager::advance` is a pure step over elapsed time; the ECS system
// feeds it the frame delta plus what it needs to know about the scene and
// forwards the resulting events to the tiles, the flag and the NPCs.

use bevy_ecs::prelude::*;
use rand::Rng;

use crate::engine::Time;
use super::arena::ArenaStats;
use super::config::RoundConfig;
use super::hex_color::HexColor;
use super::hexagon::HexTile;
use super::GameRng;

/// Broadcast to every behaviour that reacts to the round cycle.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum RoundEvent {
    GameStarted,
    SelectionStarted { round: u32 },
    SafeColorChosen { round: u32, color: HexColor },
    WarningStarted { round: u32, color: HexColor, duration: f32 },
    TilesDropped { round: u32, color: HexColor },
    RegenerationStarted { round: u32 },
    RoundCompleted { round: u32, survivors: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    NotStarted,
    SelectingColor,
    Warning,
    Dropping,
    WaitingRegeneration,
}

impl RoundPhase {
    pub fn label(self) -> &'static str {
        match self {
            RoundPhase::NotStarted => "Get ready",
            RoundPhase::SelectingColor => "Choosing colour",
            RoundPhase::Warning => "Run!",
            RoundPhase::Dropping => "Dropping",
            RoundPhase::WaitingRegeneration => "Regenerating",
        }
    }
}

#[derive(Resource, Debug, Clone)]
pub struct RoundManager {
    config: RoundConfig,
    phase: RoundPhase,
    phase_elapsed: f32,
    phase_duration: f32,
    round: u32,
    safe_color: Option<HexColor>,
    game_started: bool,
}

impl RoundManager {
    pub fn new(config: RoundConfig) -> Self {
        let start_delay = config.start_delay;
        Self {
            config,
            phase: RoundPhase::NotStarted,
            phase_elapsed: 0.0,
            phase_duration: start_delay,
            round: 0,
            safe_color: None,
            game_started: false,
        }
    }

    pub fn phase(&self) -> RoundPhase { self.phase }
    pub fn round(&self) -> u32 { self.round }
    pub fn safe_color(&self) -> Option<HexColor> { self.safe_color }
    pub fn is_started(&self) -> bool { self.game_started }

    /// Seconds left in the current phase. `WaitingRegeneration` may run past
    /// zero while tiles are still coming back.
    pub fn phase_remaining(&self) -> f32 {
        (self.phase_duration - self.phase_elapsed).max(0.0)
    }

    /// Advance the state machine by `dt` seconds and return the events fired.
    ///
    /// `all_tiles_standing` gates the end of `WaitingRegeneration`;
    /// `survivors` is reported in `RoundCompleted`.
    pub fn advance(
        &mut self,
        dt: f32,
        all_tiles_standing: bool,
        survivors: u32,
        rng: &mut impl Rng,
    ) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        self.phase_elapsed += dt;

        // A long frame may cross several phases; leftover time carries over.
        loop {
            if self.phase_elapsed < self.phase_duration {
                break;
            }
            match self.phase {
                RoundPhase::NotStarted => {
                    self.game_started = true;
                    log::info!("game started");
                    events.push(RoundEvent::GameStarted);
                    self.begin_selection(&mut events);
                }
                RoundPhase::SelectingColor => {
                    let color = HexColor::random(rng);
                    self.safe_color = Some(color);
                    let duration = self.config.warning_for_round(self.round);
                    log::info!("round {}: safe colour is {} ({:.2}s warning)", self.round, color, duration);
                    events.push(RoundEvent::SafeColorChosen { round: self.round, color });
                    events.push(RoundEvent::WarningStarted { round: self.round, color, duration });
                    self.enter(RoundPhase::Warning, duration);
                }
                RoundPhase::Warning => {
                    // Always set on the way into Warning.
                    let Some(color) = self.safe_color else {
                        log::warn!("round {}: warning ended without a safe colour", self.round);
                        self.begin_selection(&mut events);
                        continue;
                    };
                    log::info!("round {}: dropping every tile that is not {}", self.round, color);
                    events.push(RoundEvent::TilesDropped { round: self.round, color });
                    self.enter(RoundPhase::Dropping, self.config.drop_duration);
                }
                RoundPhase::Dropping => {
                    events.push(RoundEvent::RegenerationStarted { round: self.round });
                    self.enter(RoundPhase::WaitingRegeneration, self.config.intermission);
                }
                RoundPhase::WaitingRegeneration => {
                    if !all_tiles_standing {
                        break;
                    }
                    log::info!("round {} complete, {} survivors", self.round, survivors);
                    events.push(RoundEvent::RoundCompleted { round: self.round, survivors });
                    // Time spent waiting on tiles does not carry into the next round.
                    self.phase_elapsed = self.phase_duration;
                    self.begin_selection(&mut events);
                }
            }
        }
        events
    }

    fn begin_selection(&mut self, events: &mut Vec<RoundEvent>) {
        self.round += 1;
        self.safe_color = None;
        log::debug!("round {}: selecting colour", self.round);
        events.push(RoundEvent::SelectionStarted { round: self.round });
        self.enter(RoundPhase::SelectingColor, self.config.selection_duration);
    }

    fn enter(&mut self, phase: RoundPhase, duration: f32) {
        self.phase_elapsed = (self.phase_elapsed - self.phase_duration).max(0.0);
        self.phase = phase;
        self.phase_duration = duration;
    }
}

/// Step the round manager once per frame and publish its events.
pub fn round_manager_system(
    time: Res<Time>,
    stats: Res<ArenaStats>,
    mut manager: ResMut<RoundManager>,
    mut rng: ResMut<GameRng>,
    tiles: Query<&HexTile>,
    mut events: EventWriter<RoundEvent>,
) {
    if time.delta <= 0.0 {
        return;
    }
    let all_standing = tiles.iter().all(HexTile::is_standing);
    let fired = manager.advance(time.delta, all_standing, stats.alive, &mut rng.0);
    events.send_batch(fired);
}
