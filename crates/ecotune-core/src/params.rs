//! Bounded, named search parameters and their mapping onto [`SimConfig`].
//!
//! A [`ParameterSpace`] is an ordered mapping from parameter name to a spec plus a read/write
//! accessor bound to one configuration field. Vectors handed to the space are interpreted in
//! entry order; normalization, clamping, and configuration writes all walk the same entry list.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::config::SimConfig;

/// Errors raised by parameter space construction and vector operations.
#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("expected a vector of length {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidSpec { name: &'static str, reason: &'static str },
    #[error("duplicate parameter name `{0}`")]
    DuplicateName(&'static str),
}

/// Immutable descriptor of one search dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    /// Dotted configuration path, used for display and documentation.
    pub config_path: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl ParamSpec {
    #[must_use]
    pub const fn new(
        name: &'static str,
        config_path: &'static str,
        min: f64,
        max: f64,
        default: f64,
    ) -> Self {
        Self {
            name,
            config_path,
            min,
            max,
            default,
        }
    }

    /// Width of the admissible interval.
    #[must_use]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    fn validate(&self) -> Result<(), ParamError> {
        if !(self.min.is_finite() && self.max.is_finite() && self.default.is_finite()) {
            return Err(ParamError::InvalidSpec {
                name: self.name,
                reason: "bounds and default must be finite",
            });
        }
        if self.min >= self.max {
            return Err(ParamError::InvalidSpec {
                name: self.name,
                reason: "min must be strictly less than max",
            });
        }
        if !(self.min..=self.max).contains(&self.default) {
            return Err(ParamError::InvalidSpec {
                name: self.name,
                reason: "default must lie within [min, max]",
            });
        }
        Ok(())
    }
}

/// Reads a configuration field as `f64`.
pub type Getter = fn(&SimConfig) -> f64;
/// Writes an `f64` into a configuration field.
pub type Setter = fn(&mut SimConfig, f64);

/// Explicit read/write binding to a single configuration field.
#[derive(Clone, Copy)]
pub struct ConfigAccessor {
    get: Getter,
    set: Setter,
}

impl ConfigAccessor {
    #[must_use]
    pub const fn new(get: Getter, set: Setter) -> Self {
        Self { get, set }
    }

    #[must_use]
    pub fn read(&self, config: &SimConfig) -> f64 {
        (self.get)(config)
    }

    pub fn write(&self, config: &mut SimConfig, value: f64) {
        (self.set)(config, value);
    }
}

impl fmt::Debug for ConfigAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConfigAccessor")
    }
}

/// One entry of the space: a spec and the field it drives.
#[derive(Debug, Clone, Copy)]
pub struct ParamEntry {
    pub spec: ParamSpec,
    pub accessor: ConfigAccessor,
}

/// Configuration field pinned to a fixed value for an experiment and excluded from search.
#[derive(Debug, Clone, Copy)]
pub struct LockedField {
    pub config_path: &'static str,
    pub value: f64,
    set: Setter,
}

impl LockedField {
    #[must_use]
    pub const fn new(config_path: &'static str, value: f64, set: Setter) -> Self {
        Self {
            config_path,
            value,
            set,
        }
    }

    fn apply(&self, config: &mut SimConfig) {
        (self.set)(config, self.value);
    }
}

/// Ordered set of bounded search parameters.
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    entries: Vec<ParamEntry>,
    by_name: HashMap<&'static str, usize>,
    locked: Vec<LockedField>,
}

macro_rules! field {
    ($($path:ident).+) => {
        ConfigAccessor::new(
            |config| f64::from(config.$($path).+),
            |config, value| config.$($path).+ = value as f32,
        )
    };
}

macro_rules! count_field {
    ($($path:ident).+) => {
        |config: &mut SimConfig, value: f64| config.$($path).+ = value.round().max(0.0) as usize
    };
}

impl ParameterSpace {
    /// Build a space from entries and locked overrides, validating every spec.
    pub fn new(entries: Vec<ParamEntry>, locked: Vec<LockedField>) -> Result<Self, ParamError> {
        let mut by_name = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            entry.spec.validate()?;
            if by_name.insert(entry.spec.name, idx).is_some() {
                return Err(ParamError::DuplicateName(entry.spec.name));
            }
        }
        Ok(Self {
            entries,
            by_name,
            locked,
        })
    }

    /// The standard ecosystem search space: unified energy costs, feeding, reproduction,
    /// refugia, detritus, archetype metabolism, and the prey soft cap.
    #[must_use]
    pub fn ecosystem() -> Self {
        let entries = vec![
            entry("base_cost", "energy.base_cost", 0.003, 0.015, 0.007, field!(energy.base_cost)),
            entry("move_cost", "energy.move_cost", 0.02, 0.08, 0.035, field!(energy.move_cost)),
            entry("accel_cost", "energy.accel_cost", 0.005, 0.025, 0.012, field!(energy.accel_cost)),
            entry("feeding_rate", "energy.feeding_rate", 0.03, 0.12, 0.06, field!(energy.feeding_rate)),
            entry(
                "feeding_efficiency",
                "energy.feeding_efficiency",
                0.6,
                0.95,
                0.80,
                field!(energy.feeding_efficiency),
            ),
            entry(
                "cooldown_factor",
                "energy.cooldown_factor",
                0.5,
                3.0,
                1.5,
                field!(energy.cooldown_factor),
            ),
            entry(
                "pred_repro_thresh",
                "reproduction.pred_threshold",
                0.5,
                0.95,
                0.85,
                field!(reproduction.pred_threshold),
            ),
            entry(
                "prey_cooldown",
                "reproduction.prey_cooldown",
                4.0,
                20.0,
                8.0,
                field!(reproduction.prey_cooldown),
            ),
            entry(
                "pred_cooldown",
                "reproduction.pred_cooldown",
                6.0,
                20.0,
                12.0,
                field!(reproduction.pred_cooldown),
            ),
            entry(
                "parent_energy_split",
                "reproduction.parent_energy_split",
                0.4,
                0.7,
                0.55,
                field!(reproduction.parent_energy_split),
            ),
            entry(
                "spawn_offset",
                "reproduction.spawn_offset",
                5.0,
                30.0,
                15.0,
                field!(reproduction.spawn_offset),
            ),
            entry(
                "heading_jitter",
                "reproduction.heading_jitter",
                0.0,
                1.0,
                0.25,
                field!(reproduction.heading_jitter),
            ),
            entry(
                "pred_density_k",
                "reproduction.pred_density_k",
                10.0,
                600.0,
                300.0,
                field!(reproduction.pred_density_k),
            ),
            entry(
                "newborn_hunt_cooldown",
                "reproduction.newborn_hunt_cooldown",
                0.5,
                5.0,
                2.0,
                field!(reproduction.newborn_hunt_cooldown),
            ),
            entry("refugia_strength", "refugia.strength", 0.3, 0.8, 0.5, field!(refugia.strength)),
            entry(
                "carcass_fraction",
                "detritus.carcass_fraction",
                0.30,
                0.90,
                0.70,
                field!(detritus.carcass_fraction),
            ),
            entry(
                "detritus_decay_rate",
                "detritus.decay_rate",
                0.01,
                0.20,
                0.05,
                field!(detritus.decay_rate),
            ),
            entry(
                "detritus_decay_eff",
                "detritus.decay_efficiency",
                0.30,
                0.80,
                0.50,
                field!(detritus.decay_efficiency),
            ),
            entry(
                "grazer_metabolic_rate",
                "archetypes.grazer.metabolic_rate",
                0.6,
                1.5,
                1.0,
                field!(archetypes.grazer.metabolic_rate),
            ),
            entry(
                "hunter_metabolic_rate",
                "archetypes.hunter.metabolic_rate",
                0.4,
                1.2,
                0.75,
                field!(archetypes.hunter.metabolic_rate),
            ),
            entry(
                "prey_density_k",
                "reproduction.prey_density_k",
                50.0,
                500.0,
                200.0,
                field!(reproduction.prey_density_k),
            ),
        ];

        let locked = vec![
            LockedField::new("reproduction.prey_threshold", 0.50, |config, value| {
                config.reproduction.prey_threshold = value as f32;
            }),
            LockedField::new("reproduction.maturity_age", 2.0, |config, value| {
                config.reproduction.maturity_age = value as f32;
            }),
            LockedField::new("reproduction.cooldown_jitter", 3.0, |config, value| {
                config.reproduction.cooldown_jitter = value as f32;
            }),
            LockedField::new("population.max_prey", 2000.0, count_field!(population.max_prey)),
            LockedField::new("population.max_pred", 500.0, count_field!(population.max_pred)),
        ];

        let by_name = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.spec.name, idx))
            .collect();
        Self {
            entries,
            by_name,
            locked,
        }
    }

    /// Number of search dimensions.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[ParamEntry] {
        &self.entries
    }

    pub fn specs(&self) -> impl Iterator<Item = &ParamSpec> + '_ {
        self.entries.iter().map(|entry| &entry.spec)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.spec.name)
    }

    #[must_use]
    pub fn locked(&self) -> &[LockedField] {
        &self.locked
    }

    /// Look up an entry by parameter name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamEntry> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }

    /// Position of `name` in vectors handled by this space.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Re-checks every spec; used after deserializing or hand-building spaces.
    pub fn validate(&self) -> Result<(), ParamError> {
        for entry in &self.entries {
            entry.spec.validate()?;
        }
        Ok(())
    }

    /// Raw default values in entry order.
    #[must_use]
    pub fn default_vector(&self) -> Vec<f64> {
        self.specs().map(|spec| spec.default).collect()
    }

    fn check_len(&self, values: &[f64]) -> Result<(), ParamError> {
        if values.len() == self.entries.len() {
            Ok(())
        } else {
            Err(ParamError::DimensionMismatch {
                expected: self.entries.len(),
                actual: values.len(),
            })
        }
    }

    /// Map raw values to `[0, 1]` coordinates (`(v - min) / (max - min)`).
    pub fn normalize(&self, raw: &[f64]) -> Result<Vec<f64>, ParamError> {
        self.check_len(raw)?;
        Ok(self
            .specs()
            .zip(raw)
            .map(|(spec, &value)| (value - spec.min) / spec.span())
            .collect())
    }

    /// Inverse of [`normalize`](Self::normalize). Values outside `[0, 1]` map outside bounds.
    pub fn denormalize(&self, normalized: &[f64]) -> Result<Vec<f64>, ParamError> {
        self.check_len(normalized)?;
        Ok(self
            .specs()
            .zip(normalized)
            .map(|(spec, &value)| spec.min + value * spec.span())
            .collect())
    }

    /// Saturate each component to its bounds. NaN components collapse to the default.
    pub fn clamp(&self, raw: &[f64]) -> Result<Vec<f64>, ParamError> {
        self.check_len(raw)?;
        Ok(self
            .specs()
            .zip(raw)
            .map(|(spec, &value)| {
                if value.is_nan() {
                    spec.default
                } else {
                    value.clamp(spec.min, spec.max)
                }
            })
            .collect())
    }

    /// Write clamped values into `config` through each accessor, then apply locked overrides.
    pub fn apply_to_config(&self, config: &mut SimConfig, raw: &[f64]) -> Result<(), ParamError> {
        let clamped = self.clamp(raw)?;
        for (entry, value) in self.entries.iter().zip(clamped) {
            entry.accessor.write(config, value);
        }
        for locked in &self.locked {
            locked.apply(config);
        }
        Ok(())
    }

    /// Read the current value of every parameter from `config`.
    #[must_use]
    pub fn read_from_config(&self, config: &SimConfig) -> Vec<f64> {
        self.entries
            .iter()
            .map(|entry| entry.accessor.read(config))
            .collect()
    }
}

fn entry(
    name: &'static str,
    config_path: &'static str,
    min: f64,
    max: f64,
    default: f64,
    accessor: ConfigAccessor,
) -> ParamEntry {
    ParamEntry {
        spec: ParamSpec::new(name, config_path, min, max, default),
        accessor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (idx, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((x - y).abs() <= tol, "component {idx}: {x} vs {y}");
        }
    }

    #[test]
    fn ecosystem_space_is_valid() {
        let space = ParameterSpace::ecosystem();
        assert_eq!(space.dimension(), 21);
        space.validate().expect("ecosystem specs are valid");
        let rebuilt = ParameterSpace::new(space.entries().to_vec(), space.locked().to_vec())
            .expect("no duplicate names");
        assert_eq!(rebuilt.dimension(), space.dimension());
    }

    #[test]
    fn normalize_round_trips_defaults() -> Result<(), ParamError> {
        let space = ParameterSpace::ecosystem();
        let defaults = space.default_vector();
        let normalized = space.normalize(&defaults)?;
        assert!(normalized.iter().all(|v| (0.0..=1.0).contains(v)));
        let restored = space.denormalize(&normalized)?;
        assert_close(&restored, &defaults, 1e-12);
        Ok(())
    }

    #[test]
    fn clamp_is_idempotent_and_bounded() -> Result<(), ParamError> {
        let space = ParameterSpace::ecosystem();
        let wild: Vec<f64> = (0..space.dimension())
            .map(|i| if i % 2 == 0 { -1e6 } else { 1e6 })
            .collect();
        let once = space.clamp(&wild)?;
        let twice = space.clamp(&once)?;
        assert_eq!(once, twice);
        for (spec, value) in space.specs().zip(&once) {
            assert!(*value >= spec.min && *value <= spec.max, "{}", spec.name);
        }
        Ok(())
    }

    #[test]
    fn nan_components_clamp_to_default() -> Result<(), ParamError> {
        let space = ParameterSpace::ecosystem();
        let mut raw = space.default_vector();
        raw[3] = f64::NAN;
        let clamped = space.clamp(&raw)?;
        assert_eq!(clamped[3], space.entries()[3].spec.default);
        Ok(())
    }

    #[test]
    fn length_mismatch_fails_fast() {
        let space = ParameterSpace::ecosystem();
        let err = space.normalize(&[0.5; 3]).unwrap_err();
        assert_eq!(
            err,
            ParamError::DimensionMismatch {
                expected: 21,
                actual: 3
            }
        );
        let mut config = SimConfig::default();
        assert!(space.apply_to_config(&mut config, &[]).is_err());
    }

    #[test]
    fn apply_writes_named_fields_and_locks() -> Result<(), ParamError> {
        let space = ParameterSpace::ecosystem();
        let mut raw = space.default_vector();
        let base_cost = space.position("base_cost").expect("base_cost");
        let hunter = space.position("hunter_metabolic_rate").expect("hunter rate");
        raw[base_cost] = 0.5; // above max, must clamp
        raw[hunter] = 0.9;

        let mut config = SimConfig::default();
        config.reproduction.prey_threshold = 0.9;
        config.population.max_prey = 7;
        space.apply_to_config(&mut config, &raw)?;

        assert!((f64::from(config.energy.base_cost) - 0.015).abs() < 1e-7);
        assert!((f64::from(config.archetypes.hunter.metabolic_rate) - 0.9).abs() < 1e-7);
        assert_eq!(config.reproduction.prey_threshold, 0.50);
        assert_eq!(config.population.max_prey, 2000);
        assert_eq!(config.population.max_pred, 500);

        let read_back = space.read_from_config(&config);
        let expected = space.clamp(&raw)?;
        assert_close(&read_back, &expected, 1e-6);
        Ok(())
    }

    #[test]
    fn default_config_matches_default_vector() {
        let space = ParameterSpace::ecosystem();
        let from_config = space.read_from_config(&SimConfig::default());
        assert_close(&from_config, &space.default_vector(), 1e-6);
    }

    #[test]
    fn config_paths_resolve_in_serialized_config() {
        let value = serde_json::to_value(SimConfig::default()).expect("serialize");
        let space = ParameterSpace::ecosystem();
        let paths = space
            .specs()
            .map(|spec| spec.config_path)
            .chain(space.locked().iter().map(|field| field.config_path));
        for path in paths {
            let pointer = format!("/{}", path.replace('.', "/"));
            assert!(
                value.pointer(&pointer).is_some_and(serde_json::Value::is_number),
                "{path} missing"
            );
        }
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let accessor = field!(energy.base_cost);
        let bad_bounds = vec![entry("x", "energy.base_cost", 1.0, 1.0, 1.0, accessor)];
        assert!(matches!(
            ParameterSpace::new(bad_bounds, Vec::new()),
            Err(ParamError::InvalidSpec { name: "x", .. })
        ));
        let bad_default = vec![entry("y", "energy.base_cost", 0.0, 1.0, 2.0, accessor)];
        assert!(ParameterSpace::new(bad_default, Vec::new()).is_err());
        let duplicate = vec![
            entry("z", "energy.base_cost", 0.0, 1.0, 0.5, accessor),
            entry("z", "energy.base_cost", 0.0, 1.0, 0.5, accessor),
        ];
        assert_eq!(
            ParameterSpace::new(duplicate, Vec::new()).unwrap_err(),
            ParamError::DuplicateName("z")
        );
    }
}
