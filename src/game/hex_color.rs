use std::fmt;

use rand::Rng;

use crate::engine::Material;

/// The seven tile colours. One of them is safe each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HexColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
}

impl HexColor {
    pub const ALL: [HexColor; 7] = [
        HexColor::Red,
        HexColor::Orange,
        HexColor::Yellow,
        HexColor::Green,
        HexColor::Blue,
        HexColor::Purple,
        HexColor::Pink,
    ];

    /// Uniform pick over all seven colours.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn name(self) -> &'static str {
        match self {
            HexColor::Red => "Red",
            HexColor::Orange => "Orange",
            HexColor::Yellow => "Yellow",
            HexColor::Green => "Green",
            HexColor::Blue => "Blue",
            HexColor::Purple => "Purple",
            HexColor::Pink => "Pink",
        }
    }

    pub fn rgb(self) -> Material {
        match self {
            HexColor::Red => Material::rgb(0.90, 0.15, 0.15),
            HexColor::Orange => Material::rgb(0.95, 0.50, 0.10),
            HexColor::Yellow => Material::rgb(0.95, 0.85, 0.15),
            HexColor::Green => Material::rgb(0.20, 0.75, 0.25),
            HexColor::Blue => Material::rgb(0.15, 0.40, 0.90),
            HexColor::Purple => Material::rgb(0.55, 0.20, 0.80),
            HexColor::Pink => Material::rgb(0.95, 0.45, 0.70),
        }
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn random_reaches_every_colour() {
        let mut rng = StdRng::seed_from_u64(1);
        let seen: HashSet<HexColor> = (0..500).map(|_| HexColor::random(&mut rng)).collect();
        assert_eq!(seen.len(), HexColor::ALL.len());
    }

    #[test]
    fn materials_are_distinct() {
        for (i, a) in HexColor::ALL.iter().enumerate() {
            for b in &HexColor::ALL[i + 1..] {
                assert_ne!(a.rgb(), b.rgb(), "{a} and {b} share a material");
            }
        }
    }
}
