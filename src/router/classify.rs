/// Command classification for routing decisions
///
/// Every command name maps to exactly one kind. The two name sets are
/// fixed; anything outside them is `Unclassified` and passed through to
/// the secondary store so unlisted commands stay forward-compatible
/// without enumeration.

/// Routing classification of a command name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Served with the fallback-read flow (primary, then secondary)
    Read,
    /// Served with the dual-write flow (primary guarded, secondary
    /// authoritative)
    Write,
    /// Passed through to the secondary store only
    Unclassified,
}

/// Classify a command name. Pure lookup, case-insensitive, no failure
/// mode.
pub fn classify(name: &str) -> CommandKind {
    let upper = name.to_uppercase();
    if is_read_command(&upper) {
        CommandKind::Read
    } else if is_write_command(&upper) {
        CommandKind::Write
    } else {
        CommandKind::Unclassified
    }
}

/// Whether a command takes a block of nested sub-commands
pub fn takes_block(name: &str) -> bool {
    name.eq_ignore_ascii_case("pipelined")
}

fn is_read_command(upper: &str) -> bool {
    matches!(upper, "GET" | "MGET" | "SMEMBERS" | "SCARD")
}

fn is_write_command(upper: &str) -> bool {
    matches!(
        upper,
        "SET" | "SETNX" | "SETEX" | "SADD" | "SREM" | "DEL" | "PIPELINED" | "FLUSHDB"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_commands() {
        for name in ["get", "mget", "smembers", "scard"] {
            assert_eq!(classify(name), CommandKind::Read, "{name}");
        }
    }

    #[test]
    fn test_write_commands() {
        for name in [
            "set", "setnx", "setex", "sadd", "srem", "del", "pipelined", "flushdb",
        ] {
            assert_eq!(classify(name), CommandKind::Write, "{name}");
        }
    }

    #[test]
    fn test_unclassified_commands() {
        for name in ["incr", "dbsize", "expire", "hget", "foo", ""] {
            assert_eq!(classify(name), CommandKind::Unclassified, "{name}");
        }
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("GET"), CommandKind::Read);
        assert_eq!(classify("Get"), CommandKind::Read);
        assert_eq!(classify("SeTeX"), CommandKind::Write);
    }

    #[test]
    fn test_block_commands() {
        assert!(takes_block("pipelined"));
        assert!(takes_block("PIPELINED"));
        assert!(!takes_block("set"));
        assert!(!takes_block("mget"));
    }
}
