//! Event categories and message priorities.

use serde::{Deserialize, Serialize};

/// The domain area a notification belongs to.
///
/// Categories drive per-user channel preferences and the category-required
/// channel override (e.g. emergencies always include SMS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    /// Grades, homework, report cards.
    Academic,
    /// Absences and late arrivals.
    Attendance,
    /// Safe-zone entry/exit, device status, SOS.
    Geolocation,
    /// Fees due, payment confirmations, subscription state.
    Billing,
    /// Panic button, medical incidents, school-wide emergencies.
    Emergency,
    /// Announcements, password resets, platform notices.
    System,
}

impl EventCategory {
    /// Stable wire name, matching the `category` columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Academic => "academic",
            EventCategory::Attendance => "attendance",
            EventCategory::Geolocation => "geolocation",
            EventCategory::Billing => "billing",
            EventCategory::Emergency => "emergency",
            EventCategory::System => "system",
        }
    }
}

impl std::str::FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "academic" => Ok(EventCategory::Academic),
            "attendance" => Ok(EventCategory::Attendance),
            "geolocation" => Ok(EventCategory::Geolocation),
            "billing" => Ok(EventCategory::Billing),
            "emergency" => Ok(EventCategory::Emergency),
            "system" => Ok(EventCategory::System),
            other => Err(format!("Unknown event category: {other}")),
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery urgency of a notification request.
///
/// Priority selects the retry budget and overall task deadline (both
/// configured, see the notify crate's `NotifyConfig`) and whether
/// per-recipient fan-out is sequenced in channel urgency order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Stable wire name, matching the `priority` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    /// High/critical requests get the larger retry budget and longer
    /// deadline band.
    pub fn is_urgent(&self) -> bool {
        matches!(self, Priority::High | Priority::Critical)
    }

    /// Whether per-recipient channels are attempted strictly in urgency
    /// order (each awaited to a terminal state before the next starts).
    /// Low/medium requests fan out concurrently instead.
    pub fn is_ordered(&self) -> bool {
        self.is_urgent()
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("Unknown priority: {other}")),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn urgency_bands() {
        assert!(!Priority::Low.is_urgent());
        assert!(!Priority::Medium.is_urgent());
        assert!(Priority::High.is_urgent());
        assert!(Priority::Critical.is_urgent());
    }

    #[test]
    fn category_round_trip() {
        for name in [
            "academic",
            "attendance",
            "geolocation",
            "billing",
            "emergency",
            "system",
        ] {
            let category: EventCategory = name.parse().unwrap();
            assert_eq!(category.as_str(), name);
        }
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&Priority::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(
            serde_json::to_string(&EventCategory::Geolocation).unwrap(),
            "\"geolocation\""
        );
    }
}
