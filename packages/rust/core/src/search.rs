//! Search query parsing and matching for component pools.
//!
//! A query is a whitespace-separated list of terms combined with AND:
//!
//! - `tag:<name>`: the component carries the tag
//! - `type:<kind>`: `prompt(s)`, `context(s)`, `rule(s)`
//! - `status:archived` / `status:active`
//! - anything else is a keyword matched against name, tags, and path
//!
//! Values may be double-quoted to include spaces: `tag:"needs review"`.

use pluqqy_shared::{ComponentItem, ComponentType, normalize_tag};

/// One AND-ed term of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Tag(String),
    /// `None` when the value names no component kind (e.g. `type:pipeline`).
    Type(Option<ComponentType>),
    Archived(bool),
    Keyword(String),
}

/// A parsed search query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub conditions: Vec<Condition>,
}

impl Query {
    pub fn parse(raw: &str) -> Self {
        let conditions = tokenize(raw)
            .into_iter()
            .filter_map(|token| parse_term(&token))
            .collect();
        Self { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether the query asks for archived items (and so needs them loaded).
    pub fn includes_archived(&self) -> bool {
        self.conditions.contains(&Condition::Archived(true))
    }

    pub fn matches(&self, item: &ComponentItem) -> bool {
        if item.is_archived != self.includes_archived() {
            return false;
        }
        self.conditions.iter().all(|c| match c {
            Condition::Tag(tag) => item.tags.iter().any(|t| t == tag),
            Condition::Type(t) => *t == Some(item.component_type),
            Condition::Archived(_) => true,
            Condition::Keyword(word) => {
                let word = word.to_lowercase();
                item.name.to_lowercase().contains(&word)
                    || item.tags.iter().any(|t| t.contains(&word))
                    || item.path.to_lowercase().contains(&word)
            }
        })
    }

    /// Filter a pool, preserving order.
    pub fn filter(&self, items: &[ComponentItem]) -> Vec<ComponentItem> {
        items.iter().filter(|i| self.matches(i)).cloned().collect()
    }
}

fn parse_term(token: &str) -> Option<Condition> {
    let Some((key, value)) = token.split_once(':') else {
        return Some(Condition::Keyword(token.to_string()));
    };
    match key.to_ascii_lowercase().as_str() {
        "tag" | "tags" => {
            let tag = normalize_tag(value);
            (!tag.is_empty()).then_some(Condition::Tag(tag))
        }
        "type" => Some(Condition::Type(value.parse().ok())),
        "status" => match value.to_ascii_lowercase().as_str() {
            "archived" => Some(Condition::Archived(true)),
            "active" => Some(Condition::Archived(false)),
            _ => None,
        },
        _ => Some(Condition::Keyword(token.to_string())),
    }
}

/// Split on whitespace, keeping double-quoted runs together (quotes removed).
fn tokenize(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in raw.chars() {
        match ch {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Add `status:archived` to a query, or remove it if present.
pub fn toggle_archived(query: &str) -> String {
    let mut words: Vec<&str> = query.split_whitespace().collect();
    let before = words.len();
    words.retain(|w| !w.eq_ignore_ascii_case("status:archived"));
    if words.len() == before {
        words.push("status:archived");
    }
    words.join(" ")
}

/// Advance the `type:` term: none → prompts → contexts → rules → none.
pub fn cycle_type(query: &str) -> String {
    let mut words: Vec<String> = query.split_whitespace().map(str::to_string).collect();
    let pos = words
        .iter()
        .position(|w| w.to_ascii_lowercase().starts_with("type:"));
    let current = pos.and_then(|i| words[i][5..].parse::<ComponentType>().ok());
    let next = match current {
        None => Some("type:prompts"),
        Some(ComponentType::Prompt) => Some("type:contexts"),
        Some(ComponentType::Context) => Some("type:rules"),
        Some(ComponentType::Rules) => None,
    };
    match (pos, next) {
        (Some(i), Some(n)) => words[i] = n.to_string(),
        (Some(i), None) => {
            words.remove(i);
        }
        (None, Some(n)) => words.push(n.to_string()),
        (None, None) => {}
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(name: &str, t: ComponentType, tags: &[&str], archived: bool) -> ComponentItem {
        ComponentItem {
            name: name.into(),
            path: format!("components/{}/{}.md", t.dir_name(), name.to_lowercase()),
            component_type: t,
            modified: Utc::now(),
            token_count: 1,
            usage_count: 0,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            is_archived: archived,
        }
    }

    #[test]
    fn parses_all_term_kinds() {
        let q = Query::parse(r#"tag:Urgent type:prompt status:archived hello tag:"needs review""#);
        assert_eq!(
            q.conditions,
            vec![
                Condition::Tag("urgent".into()),
                Condition::Type(Some(ComponentType::Prompt)),
                Condition::Archived(true),
                Condition::Keyword("hello".into()),
                Condition::Tag("needs-review".into()),
            ]
        );
        assert!(q.includes_archived());
        assert!(Query::parse("   ").is_empty());
    }

    #[test]
    fn empty_query_matches_active_only() {
        let q = Query::parse("");
        assert!(q.matches(&item("A", ComponentType::Rules, &[], false)));
        assert!(!q.matches(&item("B", ComponentType::Rules, &[], true)));
    }

    #[test]
    fn archived_prompts_tagged_urgent() {
        let pool = vec![
            item("One", ComponentType::Prompt, &["urgent"], true),
            item("Two", ComponentType::Prompt, &["urgent"], false),
            item("Three", ComponentType::Context, &["urgent"], true),
            item("Four", ComponentType::Prompt, &["later"], true),
        ];
        let q = Query::parse("tag:urgent type:prompt status:archived");
        let hits = q.filter(&pool);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "One");
    }

    #[test]
    fn keywords_match_name_tags_and_path() {
        let i = item("Review Code", ComponentType::Prompt, &["golang"], false);
        assert!(Query::parse("review").matches(&i));
        assert!(Query::parse("GOLANG").matches(&i));
        assert!(Query::parse("prompts/").matches(&i));
        assert!(!Query::parse("review python").matches(&i));
        assert!(!Query::parse("type:pipeline").matches(&i));
    }

    #[test]
    fn toggle_archived_adds_and_removes() {
        assert_eq!(toggle_archived("tag:x"), "tag:x status:archived");
        assert_eq!(toggle_archived("tag:x status:archived"), "tag:x");
        assert_eq!(toggle_archived(""), "status:archived");
    }

    #[test]
    fn cycle_type_walks_kinds() {
        let mut q = String::from("foo");
        let mut seen = Vec::new();
        for _ in 0..4 {
            q = cycle_type(&q);
            seen.push(q.clone());
        }
        assert_eq!(
            seen,
            vec!["foo type:prompts", "foo type:contexts", "foo type:rules", "foo"]
        );
        assert_eq!(cycle_type("type:prompt bar"), "type:contexts bar");
    }
}
