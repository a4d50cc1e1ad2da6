//! Bundled verification scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// FLX-001: Empty stream only completes
    Empty,

    /// FLX-002: "foo" and "bar" from individual values
    FooBarValues,

    /// FLX-003: "foo" and "bar" from a list
    FooBarList,

    /// FLX-004: Immediate illegal state error
    Error,

    /// FLX-005: "foo", "bar", then a runtime error
    FooBarError,

    /// FLX-006: Skyler and Jesse user records
    Records,

    /// FLX-007: 10 ticks at 100ms under virtual time
    Counter,

    /// FLX-008: 3600 ticks at 1s under virtual time
    HourCounter,

    /// FLX-009: Seeded random values round trip
    RandomValues,

    /// FLX-010: Seeded user records matched one by one
    SeededRecords,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Empty,
            ScenarioId::FooBarValues,
            ScenarioId::FooBarList,
            ScenarioId::Error,
            ScenarioId::FooBarError,
            ScenarioId::Records,
            ScenarioId::Counter,
            ScenarioId::HourCounter,
            ScenarioId::RandomValues,
            ScenarioId::SeededRecords,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Empty => "empty",
            ScenarioId::FooBarValues => "foo_bar_values",
            ScenarioId::FooBarList => "foo_bar_list",
            ScenarioId::Error => "error",
            ScenarioId::FooBarError => "foo_bar_error",
            ScenarioId::Records => "records",
            ScenarioId::Counter => "counter",
            ScenarioId::HourCounter => "hour_counter",
            ScenarioId::RandomValues => "random_values",
            ScenarioId::SeededRecords => "seeded_records",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Empty => "Empty stream verified against a lone completion",
            ScenarioId::FooBarValues => "Two values emitted in argument order, then completion",
            ScenarioId::FooBarList => "Two values walked from a list, then completion",
            ScenarioId::Error => "Illegal state error with no values",
            ScenarioId::FooBarError => "Two values followed by a runtime error",
            ScenarioId::Records => "Two user records matched on their username",
            ScenarioId::Counter => "take(periodic(100ms), 10) after a 10s virtual await",
            ScenarioId::HourCounter => "take(periodic(1s), 3600) after a one-hour virtual await",
            ScenarioId::RandomValues => "Seeded random values checked one by one",
            ScenarioId::SeededRecords => "Seeded user records matched on their username",
        }
    }

    /// Returns true if the scenario drives a periodic stream on the clock.
    pub fn is_clock_driven(&self) -> bool {
        matches!(self, ScenarioId::Counter | ScenarioId::HourCounter)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "empty" | "flx-001" => Ok(ScenarioId::Empty),
            "foo_bar_values" | "foobarvalues" | "flx-002" => Ok(ScenarioId::FooBarValues),
            "foo_bar_list" | "foobarlist" | "flx-003" => Ok(ScenarioId::FooBarList),
            "error" | "flx-004" => Ok(ScenarioId::Error),
            "foo_bar_error" | "foobarerror" | "flx-005" => Ok(ScenarioId::FooBarError),
            "records" | "flx-006" => Ok(ScenarioId::Records),
            "counter" | "flx-007" => Ok(ScenarioId::Counter),
            "hour_counter" | "hourcounter" | "flx-008" => Ok(ScenarioId::HourCounter),
            "random_values" | "randomvalues" | "flx-009" => Ok(ScenarioId::RandomValues),
            "seeded_records" | "seededrecords" | "flx-010" => Ok(ScenarioId::SeededRecords),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("FLX-008".parse::<ScenarioId>(), Ok(ScenarioId::HourCounter));
        assert_eq!("FooBarList".parse::<ScenarioId>(), Ok(ScenarioId::FooBarList));
        assert_eq!("flx-010".parse::<ScenarioId>(), Ok(ScenarioId::SeededRecords));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_clock_driven_scenarios() {
        let driven: Vec<_> = ScenarioId::all().into_iter().filter(|s| s.is_clock_driven()).collect();
        assert_eq!(driven, vec![ScenarioId::Counter, ScenarioId::HourCounter]);
    }
}
