// Flag prop: shows the round's safe colour.
//
// Roulette while the colour is being chosen, shown once it is picked,
// lowered when the dropped tiles start regenerating.

use bevy_ecs::prelude::*;
use rand::Rng;

use crate::engine::{Material, Time};
use super::config::FlagConfig;
use super::hex_color::HexColor;
use super::round::RoundEvent;
use super::GameRng;

#[derive(Component, Debug, Clone, Default)]
pub struct Flag {
    displayed: Option<HexColor>,
    visible: bool,
    /// 0 = lowered, 1 = fully raised.
    raise: f32,
    /// Seconds until the next roulette colour; `None` when not cycling.
    roulette: Option<f32>,
}

impl Flag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn displayed(&self) -> Option<HexColor> { self.displayed }
    pub fn is_visible(&self) -> bool { self.visible }
    pub fn raise(&self) -> f32 { self.raise }
    pub fn is_cycling(&self) -> bool { self.roulette.is_some() }

    pub fn show_color(&mut self, color: HexColor) {
        self.displayed = Some(color);
        self.visible = true;
        self.roulette = None;
    }

    /// Lower the flag. The last colour stays on the cloth.
    pub fn hide(&mut self) {
        self.visible = false;
        self.roulette = None;
    }

    pub fn start_roulette(&mut self) {
        self.visible = true;
        self.roulette = Some(0.0);
    }

    /// Advance the raise animation and the roulette.
    pub fn tick(&mut self, dt: f32, config: &FlagConfig, rng: &mut impl Rng) {
        let target = if self.visible { 1.0 } else { 0.0 };
        let step = dt / config.raise_duration;
        self.raise = if self.raise < target {
            (self.raise + step).min(target)
        } else {
            (self.raise - step).max(target)
        };

        if let Some(timer) = self.roulette.as_mut() {
            *timer -= dt;
            if *timer <= 0.0 {
                *timer += config.roulette_interval;
                self.displayed = Some(HexColor::random(rng));
            }
        }
    }
}

pub fn flag_system(
    mut events: EventReader<RoundEvent>,
    time: Res<Time>,
    config: Res<FlagConfig>,
    mut rng: ResMut<GameRng>,
    mut flags: Query<(&mut Flag, Option<&mut Material>)>,
) {
    let fired: Vec<RoundEvent> = events.read().copied().collect();
    for (mut flag, material) in flags.iter_mut() {
        for event in &fired {
            match *event {
                RoundEvent::SelectionStarted { .. } => flag.start_roulette(),
                RoundEvent::SafeColorChosen { color, .. } => flag.show_color(color),
                RoundEvent::RegenerationStarted { .. } => flag.hide(),
                _ => {}
            }
        }
        flag.tick(time.delta, &config, &mut rng.0);

        match (material, flag.displayed()) {
            (Some(mut material), Some(color)) => {
                if *material != color.rgb() {
                    *material = color.rgb();
                }
            }
            (None, Some(_)) => log::debug!("flag has no material, skipping colour"),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn show_then_hide_keeps_last_colour() {
        let mut flag = Flag::new();
        assert!(!flag.is_visible());
        flag.show_color(HexColor::Green);
        assert!(flag.is_visible());
        assert_eq!(flag.displayed(), Some(HexColor::Green));
        flag.hide();
        assert!(!flag.is_visible());
        assert_eq!(flag.displayed(), Some(HexColor::Green));
    }

    #[test]
    fn raise_animates_toward_visibility() {
        let config = FlagConfig { raise_duration: 1.0, ..Default::default() };
        let mut rng = StdRng::seed_from_u64(0);
        let mut flag = Flag::new();
        flag.show_color(HexColor::Red);
        flag.tick(0.5, &config, &mut rng);
        assert_relative_eq!(flag.raise(), 0.5);
        flag.tick(5.0, &config, &mut rng);
        assert_relative_eq!(flag.raise(), 1.0);
        flag.hide();
        flag.tick(0.25, &config, &mut rng);
        assert_relative_eq!(flag.raise(), 0.75);
    }

    #[test]
    fn roulette_cycles_until_colour_is_shown() {
        let config = FlagConfig { roulette_interval: 0.1, ..Default::default() };
        let mut rng = StdRng::seed_from_u64(4);
        let mut flag = Flag::new();
        flag.start_roulette();
        assert!(flag.is_visible());
        flag.tick(0.01, &config, &mut rng);
        assert!(flag.displayed().is_some());
        assert!(flag.is_cycling());

        flag.show_color(HexColor::Pink);
        for _ in 0..10 {
            flag.tick(0.1, &config, &mut rng);
        }
        assert!(!flag.is_cycling());
        assert_eq!(flag.displayed(), Some(HexColor::Pink));
    }
}
