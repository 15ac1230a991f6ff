//! Text passed to the embedding provider is enriched with lightweight
//! metadata so near-duplicate content in different scopes/tags still
//! separates in vector space.

use memory_core::types::Memory;

pub fn enrich_for_embedding(memory: &Memory) -> String {
    let mut out = format!("[{}|{}]", memory.scope.as_str(), memory.project_id);
    if !memory.tags.is_empty() {
        out.push_str(" Tags: ");
        out.push_str(&memory.tags.join(", "));
    }
    if !memory.content.is_empty() {
        out.push(' ');
        out.push_str(&memory.content);
    }
    out
}

pub fn enrich_query(query: &str) -> String {
    format!("[Query] {query}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memory_core::types::Scope;

    fn mk(content: &str, tags: Vec<&str>) -> Memory {
        Memory::new(
            content.to_string(),
            Scope::Project,
            "proj-a".to_string(),
            tags.into_iter().map(String::from).collect(),
            0.5,
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn enrichment_includes_scope_and_project_prefix() {
        let mem = mk("learned something", vec![]);
        let enriched = enrich_for_embedding(&mem);
        assert!(enriched.starts_with("[project|proj-a]"));
    }

    #[test]
    fn enrichment_lists_tags_when_present() {
        let mem = mk("x", vec!["learning", "rust"]);
        let enriched = enrich_for_embedding(&mem);
        assert!(enriched.contains("Tags: learning, rust"));
    }

    #[test]
    fn enrichment_omits_tags_section_when_empty() {
        let mem = mk("just content", vec![]);
        let enriched = enrich_for_embedding(&mem);
        assert!(!enriched.contains("Tags:"));
    }

    #[test]
    fn query_enrichment_format() {
        assert_eq!(enrich_query("find sql queries"), "[Query] find sql queries");
    }
}
