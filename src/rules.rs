use serde::Deserialize;

use crate::client::TagMask;

/// One placement rule. `None` pattern fields match anything; present
/// fields match by substring containment against the window's class,
/// instance and title.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Rule {
    pub class: Option<String>,
    pub instance: Option<String>,
    pub title: Option<String>,
    pub tags: TagMask,
    pub is_floating: bool,
    pub monitor: Option<usize>,
}

impl Rule {
    fn matches(&self, class: &str, instance: &str, title: &str) -> bool {
        self.title.as_deref().is_none_or(|t| title.contains(t))
            && self.class.as_deref().is_none_or(|c| class.contains(c))
            && self.instance.as_deref().is_none_or(|i| instance.contains(i))
    }
}

/// The outcome of rule application for a freshly managed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub tags: TagMask,
    pub is_floating: bool,
    pub monitor: usize,
}

/// Scan the rules first to last. Tag bits accumulate across matches;
/// the floating flag and target monitor are overwritten by later
/// matches. A zero tag mask after masking falls back to the target
/// monitor's active tag view.
pub fn apply_rules(
    class: &str,
    instance: &str,
    title: &str,
    rules: &[Rule],
    monitor_count: usize,
    selected_monitor: usize,
    all_tags: TagMask,
    view_tags_of: impl Fn(usize) -> TagMask,
) -> Placement {
    let mut placement = Placement {
        tags: 0,
        is_floating: false,
        monitor: selected_monitor,
    };

    for rule in rules {
        if rule.matches(class, instance, title) {
            placement.is_floating = rule.is_floating;
            placement.tags |= rule.tags;
            if let Some(monitor) = rule.monitor
                && monitor < monitor_count
            {
                placement.monitor = monitor;
            }
        }
    }

    placement.tags &= all_tags;
    if placement.tags == 0 {
        placement.tags = view_tags_of(placement.monitor);
    }
    placement
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: TagMask = 0x1ff;

    fn rule(class: Option<&str>, tags: TagMask, floating: bool) -> Rule {
        Rule {
            class: class.map(str::to_string),
            tags,
            is_floating: floating,
            ..Default::default()
        }
    }

    fn apply(rules: &[Rule], class: &str) -> Placement {
        apply_rules(class, "inst", "title", rules, 1, 0, ALL, |_| 0b1)
    }

    #[test]
    fn matching_rule_assigns_tags_and_floating() {
        let rules = [rule(Some("Foo"), 0b0010, true)];
        let placement = apply(&rules, "Foo");
        assert_eq!(placement.tags, 0b0010);
        assert!(placement.is_floating);
    }

    #[test]
    fn no_match_falls_back_to_the_monitor_view() {
        let rules = [rule(Some("Foo"), 0b0010, true)];
        let placement = apply(&rules, "Bar");
        assert_eq!(placement.tags, 0b1);
        assert!(!placement.is_floating);
        assert_eq!(placement.monitor, 0);
    }

    #[test]
    fn matching_is_substring_containment() {
        let rules = [rule(Some("term"), 0b1000, false)];
        assert_eq!(apply(&rules, "xterminal").tags, 0b1000);
        assert_eq!(apply(&rules, "Term").tags, 0b1, "matching is case sensitive");
    }

    #[test]
    fn tag_bits_or_together_across_matches() {
        let rules = [
            rule(Some("Foo"), 0b0001, false),
            rule(None, 0b0100, true),
        ];
        let placement = apply(&rules, "Foo");
        assert_eq!(placement.tags, 0b0101);
        assert!(placement.is_floating, "later match overwrites floating");
    }

    #[test]
    fn later_floating_overwrites_earlier() {
        let rules = [
            rule(Some("Foo"), 0b0001, true),
            rule(Some("Foo"), 0, false),
        ];
        assert!(!apply(&rules, "Foo").is_floating);
    }

    #[test]
    fn out_of_range_tag_bits_are_masked_off() {
        let rules = [rule(Some("Foo"), 1 << 20, false)];
        let placement = apply(&rules, "Foo");
        assert_eq!(placement.tags, 0b1, "masked to zero, then view fallback");
    }

    #[test]
    fn rule_monitor_must_exist() {
        let mut with_monitor = rule(Some("Foo"), 0b1, false);
        with_monitor.monitor = Some(5);
        let placement = apply_rules("Foo", "", "", &[with_monitor.clone()], 1, 0, ALL, |_| 0b1);
        assert_eq!(placement.monitor, 0);

        let placement = apply_rules("Foo", "", "", &[with_monitor], 6, 0, ALL, |_| 0b1);
        assert_eq!(placement.monitor, 5);
    }

    #[test]
    fn dont_care_fields_match_everything() {
        let catch_all = Rule::default();
        assert!(catch_all.matches("anything", "at", "all"));
    }
}
