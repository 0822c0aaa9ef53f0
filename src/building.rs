//! Building kinds and the producers they describe.

use crate::catalogue::RecipeSpec;
use crate::error::RationalError;
use crate::models::Resource;
use crate::rational::Rational;

/// Element burned by blast furnaces on every craft.
pub const HOT_AIR: &str = "hot_air";

/// What a building is, with exactly the numbers that kind needs.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildingKind {
    /// Assemblers, smelters, crushers: a flat speed multiplier.
    Crafter {
        speed: Rational,
        power_usage: Rational,
    },
    /// Runs at base speed; consumes resources continuously.
    ResourceConverter { power_usage: Rational },
    /// Speed grows with stacked tower modules; every craft burns hot air.
    BlastFurnace {
        base_speed: Rational,
        tower_speed_bonus: Rational,
        max_towers: u32,
        hot_air_per_minute: Rational,
        power_usage: Rational,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub identifier: String,
    pub name: String,
    pub icon: String,
    pub kind: BuildingKind,
}

impl Building {
    pub fn new(identifier: &str, name: &str, kind: BuildingKind) -> Self {
        Self {
            identifier: identifier.to_string(),
            name: name.to_string(),
            icon: identifier.to_lowercase(),
            kind,
        }
    }

    pub fn speed(&self) -> Result<Rational, RationalError> {
        match &self.kind {
            BuildingKind::Crafter { speed, .. } => Ok(*speed),
            BuildingKind::ResourceConverter { .. } => Ok(Rational::ONE),
            BuildingKind::BlastFurnace {
                base_speed,
                tower_speed_bonus,
                max_towers,
                ..
            } => {
                let extra_towers = Rational::from(max_towers.saturating_sub(1));
                base_speed.checked_add(extra_towers.checked_mul(*tower_speed_bonus)?)
            }
        }
    }

    pub fn power_usage(&self) -> Rational {
        match &self.kind {
            BuildingKind::Crafter { power_usage, .. }
            | BuildingKind::ResourceConverter { power_usage }
            | BuildingKind::BlastFurnace { power_usage, .. } => *power_usage,
        }
    }

    /// Hot air burned by one furnace craft; `None` for other kinds.
    pub fn hot_air_per_craft(&self) -> Result<Option<Rational>, RationalError> {
        match &self.kind {
            BuildingKind::BlastFurnace {
                hot_air_per_minute, ..
            } => Ok(Some(hot_air_per_minute.checked_div(self.speed()?)?)),
            BuildingKind::Crafter { .. } | BuildingKind::ResourceConverter { .. } => Ok(None),
        }
    }

    /// Adds what one craft burns in this building on top of the recipe's
    /// own inputs.
    pub fn prepare_recipe(&self, spec: RecipeSpec) -> Result<RecipeSpec, RationalError> {
        match self.hot_air_per_craft()? {
            Some(air) => Ok(spec.input(Resource::element(HOT_AIR), air)),
            None => Ok(spec),
        }
    }
}
