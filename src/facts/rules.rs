//! Extraction rule tables. Each rule maps one report location to facts.

/// Dimension set a rule's facts carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// `Host Name`.
    Host,
    /// `DB Name` and `Instance`.
    Instance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    /// Size with a G/M/K suffix, stored in mebibytes.
    Mebibytes,
    Text,
}

/// Reads `column` from the first row of `section`.
#[derive(Clone, Copy, Debug)]
pub struct FirstRowRule {
    pub scope: Scope,
    pub section: &'static str,
    pub column: &'static str,
    pub category: &'static str,
    pub name: &'static str,
    pub kind: ValueKind,
}

/// Finds the row of `section` whose `match_column` reads `label` and takes
/// its `value_column`.
#[derive(Clone, Copy, Debug)]
pub struct LookupRule {
    pub section: &'static str,
    pub match_column: &'static str,
    pub label: &'static str,
    pub value_column: &'static str,
    pub category: &'static str,
    pub name: &'static str,
    pub kind: ValueKind,
}

#[derive(Clone, Copy, Debug)]
pub enum RowName {
    Column(&'static str),
    /// `Obj_ Type Owner.Object Name[.Subobject Name]`.
    Segment,
}

/// One fact per row of `section`, at instance scope.
#[derive(Clone, Copy, Debug)]
pub struct RowRule {
    pub section: &'static str,
    pub category: &'static str,
    pub name: RowName,
    pub value_column: &'static str,
    pub kind: ValueKind,
    /// Rows where this column is present and blank are not timed; skip them.
    pub skip_blank: Option<&'static str>,
}

#[derive(Clone, Copy, Debug)]
pub enum Impact {
    Column(&'static str),
    /// Executions as a percentage of the report-wide execution count.
    ShareOfExecutions,
    None,
}

/// Top-SQL section. Each row yields the raw value, an impact fact keyed by
/// SQL id, and a module record.
#[derive(Clone, Copy, Debug)]
pub struct SqlRule {
    pub section: &'static str,
    pub category: &'static str,
    pub value_column: &'static str,
    pub impact: Impact,
}

pub const SNAPSHOT_MATCH_COLUMN: &str = "Column 1";
pub const BEGIN_SNAP: &str = "Begin Snap:";
pub const END_SNAP: &str = "End Snap:";
pub const SNAP_TIME: &str = "Snap Time";

pub const SQL_IMPACT: &str = "SQL Impact";
pub const SQL_MODULE: &str = "SQL Module";
pub const SQL_TEXT: &str = "SQL Text";
pub const SQL_TEXT_SECTION: &str = "the text of the sql statements which have been referred to in the report";

const SYSTEM_LOAD: &str = "system load statistics";
const HOST_INFO: &str = "host information";
const SNAPSHOT_INFO: &str = "snapshot information";
const CACHE_SIZES: &str = "cache sizes and other statistics for different types of cache";
const LOAD_PROFILE: &str = "load profile";
const EFFICIENCY: &str = "instance efficiency percentages";
const SERVICES: &str = "service statistics";

const fn first(
    scope: Scope,
    section: &'static str,
    column: &'static str,
    category: &'static str,
    name: &'static str,
    kind: ValueKind,
) -> FirstRowRule {
    FirstRowRule {
        scope,
        section,
        column,
        category,
        name,
        kind,
    }
}

pub const FIRST_ROW_RULES: &[FirstRowRule] = &[
    first(Scope::Host, SYSTEM_LOAD, "%User", "Host CPU", "CPU %User", ValueKind::Number),
    first(Scope::Host, SYSTEM_LOAD, "%System", "Host CPU", "CPU %System", ValueKind::Number),
    first(Scope::Host, HOST_INFO, "Platform", "Host information", "Platform", ValueKind::Text),
    first(Scope::Host, HOST_INFO, "CPUs", "Host information", "CPUs", ValueKind::Number),
    first(Scope::Host, HOST_INFO, "Cores", "Host information", "CPU Cores", ValueKind::Number),
    first(Scope::Host, HOST_INFO, "Sockets", "Host information", "CPU Sockets", ValueKind::Number),
    first(Scope::Host, HOST_INFO, "Memory (GB)", "Host information", "Memory (GB)", ValueKind::Number),
    first(Scope::Instance, SNAPSHOT_INFO, "Sessions", "Sessions", "Sessions", ValueKind::Number),
    first(
        Scope::Instance,
        SNAPSHOT_INFO,
        "Cursors/Session",
        "Cursors/Session",
        "Cursors/Session",
        ValueKind::Number,
    ),
];

const fn cache(match_column: &'static str, label: &'static str, value_column: &'static str, name: &'static str) -> LookupRule {
    LookupRule {
        section: CACHE_SIZES,
        match_column,
        label,
        value_column,
        category: "Cache Sizes",
        name,
        kind: ValueKind::Mebibytes,
    }
}

const fn load(category: &'static str, label: &'static str, name: &'static str) -> LookupRule {
    LookupRule {
        section: LOAD_PROFILE,
        match_column: "Column 1",
        label,
        value_column: "Per Second",
        category,
        name,
        kind: ValueKind::Number,
    }
}

const fn efficiency(left: bool, label: &'static str, name: &'static str) -> LookupRule {
    let (match_column, value_column) = if left {
        ("Column 0", "Column 1")
    } else {
        ("Column 2", "Column 3")
    };
    LookupRule {
        section: EFFICIENCY,
        match_column,
        label,
        value_column,
        category: "Instance Efficiency",
        name,
        kind: ValueKind::Number,
    }
}

const DB_TIME: &str = "Load Profile - DB Time";
const REDO: &str = "Load Profile - Redo Size";
const IO: &str = "Load Profile - I/O";
const ACTIVITIES: &str = "Load Profile - Activities";

/// Instance-scoped values addressed by row label.
pub const LOOKUP_RULES: &[LookupRule] = &[
    cache("Column 1", "Buffer Cache:", "Begin", "Buffer Cache"),
    cache("Column 1", "Shared Pool Size:", "Begin", "Shared Pool"),
    cache("Column 4", "Log Buffer:", "Column 5", "Log Buffer"),
    load(DB_TIME, "DB Time(s):", "DB Time per second"),
    load(DB_TIME, "DB CPU(s):", "DB CPU per second"),
    load(REDO, "Redo size:", "Redo Size per second"),
    load(IO, "Logical reads:", "Logical Reads per second"),
    load(IO, "Block changes:", "Block Changes per second"),
    load(IO, "Physical reads:", "Physical Reads per second"),
    load(IO, "Physical writes:", "Physical Writes per second"),
    load(ACTIVITIES, "User calls:", "User Calls per second"),
    load(ACTIVITIES, "Parses:", "Parses per second"),
    load(ACTIVITIES, "Hard parses:", "Hard parses per second"),
    load(ACTIVITIES, "Logons:", "Logons per second"),
    load(ACTIVITIES, "Executes:", "Executes per second"),
    load(ACTIVITIES, "Rollbacks:", "Rollbacks per second"),
    load(ACTIVITIES, "Transactions:", "Transactions per second"),
    efficiency(true, "Buffer Nowait %:", "Buffer Nowait"),
    efficiency(false, "Redo NoWait %:", "Redo Nowait"),
    efficiency(true, "Buffer Hit %:", "Buffer Hit"),
    efficiency(false, "In-memory Sort %:", "In-memory Sort"),
    efficiency(true, "Library Hit %:", "Library Hit"),
    efficiency(false, "Soft Parse %:", "Soft Parse"),
    efficiency(true, "Execute to Parse %:", "Execute to Parse"),
    efficiency(false, "Latch Hit %:", "Latch Hit"),
    efficiency(true, "Parse CPU to Parse Elapsd %:", "Parse CPU to Parse Elapsd"),
    efficiency(false, "% Non-Parse CPU:", "Non-Parse CPU"),
];

const fn rows(
    section: &'static str,
    category: &'static str,
    name: RowName,
    value_column: &'static str,
    skip_blank: Option<&'static str>,
) -> RowRule {
    RowRule {
        section,
        category,
        name,
        value_column,
        kind: ValueKind::Number,
        skip_blank,
    }
}

const fn segments(section: &'static str, category: &'static str, value_column: &'static str) -> RowRule {
    rows(section, category, RowName::Segment, value_column, None)
}

/// Per-row sections. All of them are optional.
pub const ROW_RULES: &[RowRule] = &[
    rows(
        "foreground wait class statistics",
        "Foreground Wait Class",
        RowName::Column("Wait Class"),
        "Total Wait Time (s)",
        None,
    ),
    rows(
        "foreground wait events and their wait statistics",
        "Foreground Wait Event",
        RowName::Column("Event"),
        "Total Wait Time (s)",
        Some("% DB time"),
    ),
    rows(
        "background wait events statistics",
        "Background Wait Event",
        RowName::Column("Event"),
        "Total Wait Time (s)",
        Some("% bg time"),
    ),
    rows(SERVICES, "Services - DB Time", RowName::Column("Service Name"), "DB Time (s)", None),
    rows(SERVICES, "Services - DB CPU", RowName::Column("Service Name"), "DB CPU (s)", None),
    rows(
        SERVICES,
        "Services - Physical Reads",
        RowName::Column("Service Name"),
        "Physical Reads (K)",
        None,
    ),
    rows(
        SERVICES,
        "Services - Logical Reads",
        RowName::Column("Service Name"),
        "Logical Reads (K)",
        None,
    ),
    segments("top segments by logical reads", "Segments by Logical Reads", "Logical Reads"),
    segments("top segments by physical reads", "Segments by Physical Reads", "Physical Reads"),
    segments(
        "top segments by physical read requests",
        "Segments by Physical Read Requests",
        "Phys Read Requests",
    ),
    segments(
        "top segments by unoptimized reads",
        "Segments by Unoptimized Reads",
        "UnOptimized Reads",
    ),
    segments(
        "top segments by direct physical reads",
        "Segments by Direct Physical Reads",
        "Direct Reads",
    ),
    segments("top segments by physical writes", "Segments by Physical Writes", "Physical Writes"),
    segments(
        "top segments by physical write requests",
        "Segments by Physical Write Requests",
        "Phys Write Requests",
    ),
    segments(
        "top segments by direct physical writes",
        "Segments by Direct Physical Writes",
        "Direct Writes",
    ),
    segments("top segments by table scans", "Segments by Table Scans", "Table Scans"),
    segments("top segments by db blocks changes", "Segments by DB Block Changes", "DB Block Changes"),
    segments("top segments by row lock waits", "Segments by Row Lock Waits", "Row Lock Waits"),
    segments("top segments by itl waits", "Segments by ITL Waits", "ITL Waits"),
    segments("top segments by buffer busy waits", "Segments by Buffer Busy Waits", "Buffer Busy Waits"),
    RowRule {
        section: SQL_TEXT_SECTION,
        category: SQL_TEXT,
        name: RowName::Column("SQL Id"),
        value_column: "SQL Text",
        kind: ValueKind::Text,
        skip_blank: None,
    },
];

const fn sql(section: &'static str, category: &'static str, value_column: &'static str, impact: Impact) -> SqlRule {
    SqlRule {
        section,
        category,
        value_column,
        impact,
    }
}

const TOTAL: Impact = Impact::Column("%Total");

pub const SQL_RULES: &[SqlRule] = &[
    sql("top sql by elapsed time", "SQL by Elapsed Time", "Elapsed Time (s)", TOTAL),
    sql("top sql by cpu time", "SQL by CPU Time", "CPU Time (s)", TOTAL),
    sql("top sql by user i/o time", "SQL by User I/O Time", "User I/O Time (s)", TOTAL),
    sql("top sql by buffer gets", "SQL by Buffer Gets", "Buffer Gets", TOTAL),
    sql("top sql by physical reads", "SQL by Physical Reads", "Physical Reads", TOTAL),
    sql(
        "top sql by unoptimized read requests",
        "SQL by Unoptimized Read Requests",
        "UnOptimized Read Reqs",
        TOTAL,
    ),
    sql(
        "top sql by number of executions",
        "SQL by Number of Executions",
        "Executions",
        Impact::ShareOfExecutions,
    ),
    sql(
        "top sql by number of parse calls",
        "SQL by Number of Parse Calls",
        "Parse Calls",
        Impact::Column("% Total Parses"),
    ),
    sql(
        "top sql by amount of shared memory used",
        "SQL by Amount of Shared Memory",
        "Sharable Mem (b)",
        Impact::Column("% Total"),
    ),
    sql("top sql by version counts", "SQL by Version Counts", "Version Count", Impact::None),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fact_names_unique_per_category() {
        let mut seen = HashSet::new();
        for rule in FIRST_ROW_RULES {
            assert!(seen.insert((rule.category, rule.name)), "{:?}", rule);
        }
        for rule in LOOKUP_RULES {
            assert!(seen.insert((rule.category, rule.name)), "{:?}", rule);
        }
    }

    #[test]
    fn test_sql_categories_distinct() {
        let categories: HashSet<_> = SQL_RULES.iter().map(|r| r.category).collect();
        assert_eq!(categories.len(), SQL_RULES.len());
        let segments = ROW_RULES
            .iter()
            .filter(|r| matches!(r.name, RowName::Segment))
            .count();
        assert_eq!(segments, 13);
    }
}
