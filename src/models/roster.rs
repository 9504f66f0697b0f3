use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use utoipa::ToSchema;

pub type AgentId = i32;

/// Well-known roster symbols. Any other short symbol is accepted as well.
pub mod symbols {
    pub const MORNING: &str = "M";
    pub const AFTERNOON: &str = "T";
    pub const NIGHT: &str = "N";
    pub const DAY_OFF: &str = "L";
    pub const VACATION: &str = "V";
    pub const PERMISSION: &str = "P";
    pub const SICK_LEAVE: &str = "B";
    pub const REST: &str = "-";
}

const MAX_SYMBOL_LEN: usize = 8;

/// Key of one monthly roster record, e.g. `julio-2025`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct MonthKey(String);

impl MonthKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque key of a slot inside a day's `shifts` map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SlotKey(String);

impl SlotKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Deterministic key for a slot created on behalf of `agent_id`.
    pub fn for_agent(agent_id: AgentId) -> Self {
        Self(format!("agent-{}", agent_id))
    }

    fn for_agent_nth(agent_id: AgentId, n: usize) -> Self {
        Self(format!("agent-{}-{}", agent_id, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid shift symbol {0:?}: expected 1-8 characters without whitespace")]
pub struct InvalidShiftType(pub String);

/// Duty symbol written into a slot (`M`, `T`, `N`, `L`, `V`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "M")]
pub struct ShiftType(String);

impl ShiftType {
    pub fn new(symbol: impl Into<String>) -> Result<Self, InvalidShiftType> {
        let symbol = symbol.into();
        let len = symbol.chars().count();
        if len == 0 || len > MAX_SYMBOL_LEN || symbol.chars().any(char::is_whitespace) {
            return Err(InvalidShiftType(symbol));
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShiftType {
    type Error = InvalidShiftType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShiftType> for String {
    fn from(value: ShiftType) -> Self {
        value.0
    }
}

impl fmt::Display for ShiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Requested change for a slot. `NoChange` means "leave the roster as it is"
/// and short-circuits every write path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "symbol", rename_all = "snake_case")]
pub enum ShiftChange {
    Assign(ShiftType),
    NoChange,
}

impl ShiftChange {
    pub fn symbol(&self) -> Option<&ShiftType> {
        match self {
            ShiftChange::Assign(symbol) => Some(symbol),
            ShiftChange::NoChange => None,
        }
    }
}

impl From<Option<ShiftType>> for ShiftChange {
    fn from(value: Option<ShiftType>) -> Self {
        value.map_or(ShiftChange::NoChange, ShiftChange::Assign)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShiftAssignment {
    pub agent_id: AgentId,
    pub shift_type: ShiftType,
}

impl ShiftAssignment {
    pub fn new(agent_id: AgentId, shift_type: ShiftType) -> Self {
        Self { agent_id, shift_type }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub is_current_month: bool,
    #[serde(default)]
    pub shifts: BTreeMap<SlotKey, ShiftAssignment>,
}

impl DaySchedule {
    pub fn empty(date: NaiveDate, is_current_month: bool) -> Self {
        Self {
            date,
            is_current_month,
            shifts: BTreeMap::new(),
        }
    }

    pub fn slot_of(&self, agent_id: AgentId) -> Option<(&SlotKey, &ShiftAssignment)> {
        self.shifts.iter().find(|(_, a)| a.agent_id == agent_id)
    }

    /// First free deterministic key for a new slot owned by `agent_id`.
    /// The plain `agent-<id>` key is used unless a different agent already holds it.
    pub fn free_key_for(&self, agent_id: AgentId) -> SlotKey {
        let base = SlotKey::for_agent(agent_id);
        if !self.shifts.contains_key(&base) {
            return base;
        }
        (2..)
            .map(|n| SlotKey::for_agent_nth(agent_id, n))
            .find(|key| !self.shifts.contains_key(key))
            .unwrap_or(base)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Week {
    /// Indexed by weekday, 0 = Monday.
    #[schema(value_type = Vec<DaySchedule>)]
    pub days: [DaySchedule; 7],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterRecord {
    pub month_key: MonthKey,
    pub weeks: Vec<Week>,
}

impl RosterRecord {
    /// Monday-first calendar grid for `year`/`month` with no assignments.
    /// Leading and trailing days of adjacent months are flagged as padding.
    pub fn blank(month_key: MonthKey, year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;

        let mut week_start = first - Duration::days(i64::from(first.weekday().num_days_from_monday()));
        let mut weeks = Vec::new();
        while week_start <= last {
            let days = std::array::from_fn(|i| {
                let date = week_start + Duration::days(i as i64);
                DaySchedule::empty(date, date.month() == month && date.year() == year)
            });
            weeks.push(Week { days });
            week_start += Duration::days(7);
        }

        Some(Self { month_key, weeks })
    }

    pub fn day(&self, position: DayPosition) -> Option<&DaySchedule> {
        self.weeks.get(position.week).map(|w| &w.days[position.weekday % 7])
    }

    /// Applies one scoped write, leaving every sibling field untouched.
    pub fn apply(&mut self, write: &FieldWrite) -> Result<(), String> {
        let slot = &write.slot;
        if slot.weekday > 6 {
            return Err(format!("weekday {} out of range", slot.weekday));
        }
        let day = self
            .weeks
            .get_mut(slot.week)
            .map(|w| &mut w.days[slot.weekday])
            .ok_or_else(|| format!("week {} out of range", slot.week))?;

        match &write.value {
            SlotWrite::Assignment(assignment) => {
                day.shifts.insert(slot.slot_key.clone(), assignment.clone());
            }
            SlotWrite::ShiftType(shift_type) => {
                let existing = day
                    .shifts
                    .get_mut(&slot.slot_key)
                    .ok_or_else(|| format!("slot {} does not exist", slot.slot_key))?;
                existing.shift_type = shift_type.clone();
            }
            SlotWrite::AgentId(agent_id) => {
                let existing = day
                    .shifts
                    .get_mut(&slot.slot_key)
                    .ok_or_else(|| format!("slot {} does not exist", slot.slot_key))?;
                existing.agent_id = *agent_id;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayPosition {
    pub week: usize,
    pub weekday: usize,
}

/// Address of one slot: `weeks[week].days[weekday].shifts[slot_key]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPath {
    pub week: usize,
    pub weekday: usize,
    pub slot_key: SlotKey,
}

impl SlotPath {
    pub fn new(day: DayPosition, slot_key: SlotKey) -> Self {
        Self {
            week: day.week,
            weekday: day.weekday,
            slot_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotWrite {
    /// Whole slot, creating it when absent.
    Assignment(ShiftAssignment),
    ShiftType(ShiftType),
    AgentId(AgentId),
}

/// A single addressed field of a roster document and the value to store there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWrite {
    pub slot: SlotPath,
    pub value: SlotWrite,
}

impl FieldWrite {
    pub fn assignment(slot: SlotPath, assignment: ShiftAssignment) -> Self {
        Self { slot, value: SlotWrite::Assignment(assignment) }
    }

    pub fn shift_type(slot: SlotPath, shift_type: ShiftType) -> Self {
        Self { slot, value: SlotWrite::ShiftType(shift_type) }
    }

    pub fn agent_id(slot: SlotPath, agent_id: AgentId) -> Self {
        Self { slot, value: SlotWrite::AgentId(agent_id) }
    }

    /// Path of the day's `shifts` object inside the `weeks` JSON document.
    pub fn shifts_path(&self) -> Vec<String> {
        vec![
            self.slot.week.to_string(),
            "days".to_string(),
            self.slot.weekday.to_string(),
            "shifts".to_string(),
        ]
    }

    /// Path inside the `weeks` JSON document.
    pub fn json_path(&self) -> Vec<String> {
        let mut path = self.shifts_path();
        path.push(self.slot.slot_key.as_str().to_string());
        match self.value {
            SlotWrite::Assignment(_) => {}
            SlotWrite::ShiftType(_) => path.push("shiftType".to_string()),
            SlotWrite::AgentId(_) => path.push("agentId".to_string()),
        }
        path
    }

    pub fn json_value(&self) -> serde_json::Value {
        match &self.value {
            SlotWrite::Assignment(assignment) => serde_json::json!({
                "agentId": assignment.agent_id,
                "shiftType": assignment.shift_type.as_str(),
            }),
            SlotWrite::ShiftType(shift_type) => serde_json::Value::String(shift_type.as_str().to_string()),
            SlotWrite::AgentId(agent_id) => serde_json::Value::from(*agent_id),
        }
    }
}

/// Result of looking up one agent on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotLocation {
    Found { path: SlotPath, assignment: ShiftAssignment },
    /// The day exists but the agent has no slot; `key` is where a new one goes.
    Vacant { day: DayPosition, key: SlotKey },
    DayMissing,
}

impl SlotLocation {
    pub fn assignment(&self) -> Option<&ShiftAssignment> {
        match self {
            SlotLocation::Found { assignment, .. } => Some(assignment),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&SlotPath> {
        match self {
            SlotLocation::Found { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// A loaded roster record with its concurrency version and a date index.
#[derive(Debug, Clone)]
pub struct RosterSnapshot {
    pub record: RosterRecord,
    pub version: i64,
    by_date: HashMap<NaiveDate, DayPosition>,
}

impl RosterSnapshot {
    pub fn new(record: RosterRecord, version: i64) -> Self {
        let mut by_date = HashMap::new();
        for (week, w) in record.weeks.iter().enumerate() {
            for (weekday, day) in w.days.iter().enumerate() {
                let position = DayPosition { week, weekday };
                // Current-month cells win over padding cells carrying the same date.
                if day.is_current_month {
                    by_date.insert(day.date, position);
                } else {
                    by_date.entry(day.date).or_insert(position);
                }
            }
        }
        Self { record, version, by_date }
    }

    pub fn month_key(&self) -> &MonthKey {
        &self.record.month_key
    }

    pub fn position_of(&self, date: NaiveDate) -> Option<DayPosition> {
        self.by_date.get(&date).copied()
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DaySchedule> {
        self.position_of(date).and_then(|p| self.record.day(p))
    }

    pub fn locate_slot(&self, date: NaiveDate, agent_id: AgentId) -> SlotLocation {
        let Some(position) = self.position_of(date) else {
            return SlotLocation::DayMissing;
        };
        let Some(day) = self.record.day(position) else {
            return SlotLocation::DayMissing;
        };
        match day.slot_of(agent_id) {
            Some((key, assignment)) => SlotLocation::Found {
                path: SlotPath::new(position, key.clone()),
                assignment: assignment.clone(),
            },
            None => SlotLocation::Vacant {
                day: position,
                key: day.free_key_for(agent_id),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn st(symbol: &str) -> ShiftType {
        ShiftType::new(symbol).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_shift_type_validation() {
        assert!(ShiftType::new("M").is_ok());
        assert!(ShiftType::new("-").is_ok());
        assert!(ShiftType::new("").is_err());
        assert!(ShiftType::new("M T").is_err());
        assert!(ShiftType::new("TOOLONGSYM").is_err());
    }

    #[test]
    fn test_blank_july_2025_grid() {
        let record = RosterRecord::blank(MonthKey::new("julio-2025"), 2025, 7).unwrap();
        // 2025-07-01 is a Tuesday, 2025-07-31 a Thursday.
        assert_eq!(record.weeks.len(), 5);
        assert_eq!(record.weeks[0].days[0].date, date("2025-06-30"));
        assert!(!record.weeks[0].days[0].is_current_month);
        assert_eq!(record.weeks[0].days[1].date, date("2025-07-01"));
        assert!(record.weeks[0].days[1].is_current_month);
        assert_eq!(record.weeks[4].days[6].date, date("2025-08-03"));
        assert!(!record.weeks[4].days[6].is_current_month);
    }

    #[test]
    fn test_blank_rejects_invalid_month() {
        assert!(RosterRecord::blank(MonthKey::new("x"), 2025, 13).is_none());
    }

    #[test]
    fn test_locate_slot_found_and_vacant() {
        let mut record = RosterRecord::blank(MonthKey::new("julio-2025"), 2025, 7).unwrap();
        // 2025-07-10 is a Thursday in the second week.
        record.weeks[1].days[3]
            .shifts
            .insert(SlotKey::new("1720000000000"), ShiftAssignment::new(7, st("M")));
        let snapshot = RosterSnapshot::new(record, 1);

        match snapshot.locate_slot(date("2025-07-10"), 7) {
            SlotLocation::Found { path, assignment } => {
                assert_eq!(path.week, 1);
                assert_eq!(path.weekday, 3);
                assert_eq!(path.slot_key, SlotKey::new("1720000000000"));
                assert_eq!(assignment.shift_type, st("M"));
            }
            other => panic!("expected Found, got {:?}", other),
        }

        match snapshot.locate_slot(date("2025-07-10"), 8) {
            SlotLocation::Vacant { key, .. } => assert_eq!(key, SlotKey::for_agent(8)),
            other => panic!("expected Vacant, got {:?}", other),
        }

        assert_eq!(snapshot.locate_slot(date("2025-09-01"), 7), SlotLocation::DayMissing);
    }

    #[test]
    fn test_index_prefers_current_month_cell() {
        let record = RosterRecord::blank(MonthKey::new("julio-2025"), 2025, 7).unwrap();
        let snapshot = RosterSnapshot::new(record, 0);
        let day = snapshot.day(date("2025-07-31")).unwrap();
        assert!(day.is_current_month);
        let padding = snapshot.day(date("2025-06-30")).unwrap();
        assert!(!padding.is_current_month);
    }

    #[test]
    fn test_free_key_skips_key_held_by_other_agent() {
        let mut day = DaySchedule::empty(date("2025-07-10"), true);
        day.shifts.insert(SlotKey::for_agent(5), ShiftAssignment::new(9, st("T")));
        assert_eq!(day.free_key_for(5), SlotKey::new("agent-5-2"));
        assert_eq!(day.free_key_for(6), SlotKey::for_agent(6));
    }

    #[test]
    fn test_apply_field_writes_touch_only_addressed_slot() {
        let mut record = RosterRecord::blank(MonthKey::new("julio-2025"), 2025, 7).unwrap();
        let day = DayPosition { week: 1, weekday: 3 };
        record
            .apply(&FieldWrite::assignment(
                SlotPath::new(day, SlotKey::for_agent(1)),
                ShiftAssignment::new(1, st("M")),
            ))
            .unwrap();
        record
            .apply(&FieldWrite::assignment(
                SlotPath::new(day, SlotKey::for_agent(2)),
                ShiftAssignment::new(2, st("T")),
            ))
            .unwrap();
        record
            .apply(&FieldWrite::shift_type(SlotPath::new(day, SlotKey::for_agent(1)), st("V")))
            .unwrap();

        let shifts = &record.day(day).unwrap().shifts;
        assert_eq!(shifts[&SlotKey::for_agent(1)], ShiftAssignment::new(1, st("V")));
        assert_eq!(shifts[&SlotKey::for_agent(2)], ShiftAssignment::new(2, st("T")));

        let missing = FieldWrite::agent_id(SlotPath::new(day, SlotKey::for_agent(3)), 4);
        assert!(record.apply(&missing).is_err());
    }

    #[test]
    fn test_field_write_json_path() {
        let path = SlotPath::new(DayPosition { week: 2, weekday: 3 }, SlotKey::new("x"));
        let write = FieldWrite::shift_type(path.clone(), st("N"));
        assert_eq!(write.json_path(), vec!["2", "days", "3", "shifts", "x", "shiftType"]);
        assert_eq!(write.json_value(), serde_json::json!("N"));

        let whole = FieldWrite::assignment(path, ShiftAssignment::new(4, st("L")));
        assert_eq!(whole.json_path(), vec!["2", "days", "3", "shifts", "x"]);
        assert_eq!(whole.json_value(), serde_json::json!({"agentId": 4, "shiftType": "L"}));
    }

    #[test]
    fn test_shift_change_serde_shape() {
        let assign: ShiftChange = serde_json::from_value(serde_json::json!({"kind": "assign", "symbol": "V"})).unwrap();
        assert_eq!(assign, ShiftChange::Assign(st("V")));
        let none: ShiftChange = serde_json::from_value(serde_json::json!({"kind": "no_change"})).unwrap();
        assert_eq!(none, ShiftChange::NoChange);
    }

    #[test]
    fn test_roster_record_json_roundtrip_shape() {
        let mut record = RosterRecord::blank(MonthKey::new("julio-2025"), 2025, 7).unwrap();
        record.weeks[1].days[3]
            .shifts
            .insert(SlotKey::for_agent(1), ShiftAssignment::new(1, st("M")));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["monthKey"], "julio-2025");
        assert_eq!(json["weeks"][1]["days"][3]["isCurrentMonth"], true);
        assert_eq!(json["weeks"][1]["days"][3]["shifts"]["agent-1"]["shiftType"], "M");
    }
}
