//! Component dependency extraction from `CMakeLists.txt`

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use serde::Serialize;

const REGISTER: &str = "idf_component_register";

/// Every keyword `idf_component_register` accepts; a value list ends at the next one
const KEYWORDS: &[&str] = &[
    "SRCS",
    "SRC_DIRS",
    "EXCLUDE_SRCS",
    "INCLUDE_DIRS",
    "PRIV_INCLUDE_DIRS",
    "LDFRAGMENTS",
    "REQUIRES",
    "PRIV_REQUIRES",
    "REQUIRED_IDF_TARGETS",
    "EMBED_FILES",
    "EMBED_TXTFILES",
    "KCONFIG",
    "KCONFIG_PROJBUILD",
    "WHOLE_ARCHIVE",
];

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ComponentDeps {
    pub requires: BTreeSet<String>,
    pub priv_requires: BTreeSet<String>,
}

impl ComponentDeps {
    pub fn all(&self) -> BTreeSet<String> {
        self.requires.union(&self.priv_requires).cloned().collect()
    }
}

/// Extract REQUIRES / PRIV_REQUIRES from every `idf_component_register(...)`
/// call in the text. Returns `None` when there is no such call.
pub fn parse_cmake(text: &str) -> Option<ComponentDeps> {
    let text = strip_comments(text);
    let lower = text.to_ascii_lowercase();
    let mut deps = ComponentDeps::default();
    let mut found = false;
    let mut search_from = 0;

    while let Some(pos) = lower[search_from..].find(REGISTER) {
        let start = search_from + pos;
        let after = start + REGISTER.len();
        search_from = after;
        // `my_idf_component_register(` is a different command
        let preceded_by_ident = lower[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        if preceded_by_ident {
            continue;
        }
        let rest = text[after..].trim_start();
        let Some(body) = rest.strip_prefix('(') else {
            continue;
        };
        found = true;

        let mut current: Option<&str> = None;
        for token in call_arguments(body) {
            if let Some(keyword) = KEYWORDS.iter().find(|k| **k == token) {
                current = Some(*keyword);
                continue;
            }
            // `${VAR}` references cannot be resolved statically
            if token.contains("${") {
                continue;
            }
            let target = match current {
                Some("REQUIRES") => &mut deps.requires,
                Some("PRIV_REQUIRES") => &mut deps.priv_requires,
                _ => continue,
            };
            target.extend(
                token
                    .split(|c: char| c == ';' || c.is_whitespace())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }
    }

    found.then_some(deps)
}

/// Remove `#` line comments and `#[[ ]]` bracket comments outside quotes
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    let mut in_quote = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quote => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '"' => {
                in_quote = !in_quote;
                out.push(c);
            }
            '#' if !in_quote => {
                let rest: String = chars.clone().take(2).collect();
                if rest == "[[" {
                    let mut prev = '\0';
                    for n in chars.by_ref() {
                        if prev == ']' && n == ']' {
                            break;
                        }
                        prev = n;
                    }
                } else {
                    for n in chars.by_ref() {
                        if n == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Tokens of a call body up to its closing parenthesis; quoted strings are
/// one token with the quotes removed.
fn call_arguments(body: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quote = false;

    for c in body.chars() {
        if in_quote {
            if c == '"' {
                in_quote = false;
                tokens.push(std::mem::take(&mut current));
            } else {
                current.push(c);
            }
            continue;
        }
        match c {
            '"' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                in_quote = true;
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' if depth == 0 => break,
            ')' => {
                depth -= 1;
                current.push(c);
            }
            c if c.is_whitespace() => {
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

#[derive(Debug, Clone, Serialize)]
pub struct ComponentInfo {
    pub name: String,
    pub requires: BTreeSet<String>,
    pub priv_requires: BTreeSet<String>,
    pub dependency_count: usize,
    pub is_leaf: bool,
    pub in_cycle: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DependencyReport {
    pub total_components: usize,
    pub components_with_deps: usize,
    pub max_dependency_depth: usize,
    pub components: Vec<ComponentInfo>,
    /// component -> union of public and private dependencies
    pub graph: BTreeMap<String, BTreeSet<String>>,
    /// Each cycle starts and ends at the same component
    pub cycles: Vec<Vec<String>>,
    pub recommendations: Vec<String>,
}

/// Build the dependency graph. Cycles are reported, never rejected.
pub fn analyze(components: &BTreeMap<String, ComponentDeps>) -> DependencyReport {
    let graph: BTreeMap<String, BTreeSet<String>> = components
        .iter()
        .map(|(name, deps)| (name.clone(), deps.all()))
        .collect();

    let cycles = find_cycles(&graph);
    let in_cycle: HashSet<&str> = cycles.iter().flatten().map(String::as_str).collect();
    let max_dependency_depth = max_depth(&graph);

    let infos: Vec<ComponentInfo> = components
        .iter()
        .map(|(name, deps)| {
            let count = graph.get(name).map_or(0, BTreeSet::len);
            ComponentInfo {
                name: name.clone(),
                requires: deps.requires.clone(),
                priv_requires: deps.priv_requires.clone(),
                dependency_count: count,
                is_leaf: count == 0,
                in_cycle: in_cycle.contains(name.as_str()),
            }
        })
        .collect();

    let mut recommendations = Vec::new();
    if !cycles.is_empty() {
        recommendations.push("Circular dependencies detected; CMake may fail to order these components".to_string());
    }
    if max_dependency_depth > 5 {
        recommendations.push(format!(
            "Deep dependency chain (depth {}); consider splitting or flattening components",
            max_dependency_depth
        ));
    }

    DependencyReport {
        total_components: components.len(),
        components_with_deps: infos.iter().filter(|c| !c.is_leaf).count(),
        max_dependency_depth,
        components: infos,
        graph,
        cycles,
        recommendations,
    }
}

fn find_cycles(graph: &BTreeMap<String, BTreeSet<String>>) -> Vec<Vec<String>> {
    fn visit<'a>(
        node: &'a str,
        graph: &'a BTreeMap<String, BTreeSet<String>>,
        path: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
        seen: &mut BTreeSet<Vec<String>>,
    ) {
        if let Some(start) = path.iter().position(|n| *n == node) {
            let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
            // rotate so equal cycles found from different entry points compare equal
            if let Some(min) = cycle.iter().enumerate().min_by(|a, b| a.1.cmp(b.1)).map(|(i, _)| i) {
                cycle.rotate_left(min);
            }
            if let Some(first) = cycle.first().cloned() {
                cycle.push(first);
            }
            seen.insert(cycle);
            return;
        }
        if done.contains(node) {
            return;
        }
        path.push(node);
        if let Some(deps) = graph.get(node) {
            for dep in deps {
                visit(dep, graph, path, done, seen);
            }
        }
        path.pop();
        done.insert(node);
    }

    let mut seen = BTreeSet::new();
    let mut done = HashSet::new();
    for node in graph.keys() {
        visit(node, graph, &mut Vec::new(), &mut done, &mut seen);
    }
    seen.into_iter().collect()
}

/// Longest dependency chain in edges; back edges count as zero
fn max_depth(graph: &BTreeMap<String, BTreeSet<String>>) -> usize {
    fn depth<'a>(
        node: &'a str,
        graph: &'a BTreeMap<String, BTreeSet<String>>,
        on_stack: &mut HashSet<&'a str>,
        memo: &mut HashMap<&'a str, usize>,
    ) -> usize {
        if let Some(d) = memo.get(node) {
            return *d;
        }
        if !on_stack.insert(node) {
            return 0;
        }
        let d = graph
            .get(node)
            .into_iter()
            .flatten()
            .map(|dep| 1 + depth(dep, graph, on_stack, memo))
            .max()
            .unwrap_or(0);
        on_stack.remove(node);
        memo.insert(node, d);
        d
    }

    let mut memo = HashMap::new();
    graph
        .keys()
        .map(|node| depth(node, graph, &mut HashSet::new(), &mut memo))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(requires: &[&str], priv_requires: &[&str]) -> ComponentDeps {
        ComponentDeps {
            requires: requires.iter().map(|s| s.to_string()).collect(),
            priv_requires: priv_requires.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_multiline_register() {
        let cmake = r#"
# REQUIRES commented_out
idf_component_register(SRCS "app_main.c" "net.c"
                       INCLUDE_DIRS "."
                       REQUIRES driver esp_wifi # inline comment
                                nvs_flash
                       PRIV_REQUIRES "esp_timer;log" ${EXTRA_REQS})
"#;
        let parsed = parse_cmake(cmake).unwrap();
        assert_eq!(parsed, deps(&["driver", "esp_wifi", "nvs_flash"], &["esp_timer", "log"]));
    }

    #[test]
    fn test_no_register_call() {
        assert!(parse_cmake("cmake_minimum_required(VERSION 3.16)\nproject(blink)\n").is_none());
        assert!(parse_cmake("").is_none());
    }

    #[test]
    fn test_register_needs_word_boundary() {
        let cmake = "my_idf_component_register(REQUIRES fake)\nidf_component_register(REQUIRES real)";
        assert_eq!(parse_cmake(cmake).unwrap(), deps(&["real"], &[]));
        assert!(parse_cmake("wrap_idf_component_register(REQUIRES fake)").is_none());
    }

    #[test]
    fn test_register_without_requires() {
        let parsed = parse_cmake("idf_component_register(SRCS \"main.c\")").unwrap();
        assert!(parsed.all().is_empty());
    }

    #[test]
    fn test_cycles_reported_not_rejected() {
        let mut components = BTreeMap::new();
        components.insert("a".to_string(), deps(&["b"], &[]));
        components.insert("b".to_string(), deps(&[], &["c"]));
        components.insert("c".to_string(), deps(&["a", "log"], &[]));
        components.insert("leaf".to_string(), deps(&[], &[]));

        let report = analyze(&components);
        assert_eq!(report.cycles, vec![vec!["a", "b", "c", "a"]]);
        assert!(report.components.iter().find(|c| c.name == "a").unwrap().in_cycle);
        assert!(!report.components.iter().find(|c| c.name == "leaf").unwrap().in_cycle);
        assert!(report.graph["c"].contains("log"));
        assert_eq!(report.components_with_deps, 3);
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn test_max_depth() {
        let mut components = BTreeMap::new();
        components.insert("main".to_string(), deps(&["net"], &[]));
        components.insert("net".to_string(), deps(&["esp_wifi"], &[]));
        let report = analyze(&components);
        assert_eq!(report.max_dependency_depth, 2);
        assert!(report.cycles.is_empty());
    }

    #[test]
    fn test_empty_graph() {
        let report = analyze(&BTreeMap::new());
        assert_eq!(report.total_components, 0);
        assert_eq!(report.max_dependency_depth, 0);
    }
}
