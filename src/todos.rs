//! Todo store
//!
//! An ordered list of todos persisted as pipe-delimited lines
//! (`text|completed|category|deadline|priority`). Display order groups by
//! priority or category depending on the selected mode; completed items
//! always sink to the bottom. Cache I/O is best-effort.

use goblin_ipc::{GroupMode, Todo};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use tracing::error;

/// Serialize one todo as a cache line.
fn format_line(todo: &Todo) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        todo.text, todo.completed, todo.category, todo.deadline, todo.priority
    )
}

/// Parse one cache line; anything without exactly five fields is skipped.
fn parse_line(line: &str) -> Option<Todo> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() != 5 {
        return None;
    }
    Some(Todo {
        text: fields[0].to_string(),
        completed: fields[1] == "true",
        category: fields[2].to_string(),
        deadline: fields[3].to_string(),
        priority: fields[4].to_string(),
    })
}

pub struct TodoStore {
    todos: Vec<Todo>,
    categories: BTreeSet<String>,
    group_mode: GroupMode,
    cache_path: PathBuf,
}

impl TodoStore {
    /// Load the persisted list, falling back to empty on any failure.
    pub fn load(cache_path: PathBuf) -> Self {
        let todos: Vec<Todo> = match fs::read_to_string(&cache_path) {
            Ok(content) => content.lines().filter_map(parse_line).collect(),
            Err(_) => Vec::new(),
        };
        let categories = todos
            .iter()
            .filter(|t| !t.category.is_empty())
            .map(|t| t.category.clone())
            .collect();
        Self {
            todos,
            categories,
            group_mode: GroupMode::Priority,
            cache_path,
        }
    }

    pub fn add(&mut self, text: &str, category: &str, priority: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let category = category.trim().to_string();
        self.todos.push(Todo {
            text: text.to_string(),
            completed: false,
            category: category.clone(),
            deadline: String::new(),
            priority: priority.to_string(),
        });
        if !category.is_empty() {
            self.categories.insert(category);
        }
        self.persist();
        true
    }

    /// Toggle completion by index into the raw (insertion-ordered) list.
    pub fn toggle(&mut self, index: usize) -> bool {
        match self.todos.get_mut(index) {
            Some(todo) => {
                todo.completed = !todo.completed;
                self.persist();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.todos.len() {
            return false;
        }
        self.todos.remove(index);
        self.persist();
        self.cleanup_unused_categories();
        true
    }

    pub fn clear(&mut self) {
        self.todos.clear();
        self.categories.clear();
        self.persist();
    }

    pub fn set_group_mode(&mut self, mode: GroupMode) {
        self.group_mode = mode;
    }

    pub fn group_mode(&self) -> GroupMode {
        self.group_mode
    }

    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    /// Display order for the current group mode.
    ///
    /// Uncategorized items sort after categorized ones within a group, and
    /// completed items always come last (stable within each half).
    pub fn sorted_for_display(&self) -> Vec<Todo> {
        let mut sorted = self.todos.clone();
        match self.group_mode {
            GroupMode::Priority => sorted.sort_by(|a, b| {
                (&a.priority, a.category.is_empty(), &a.category)
                    .cmp(&(&b.priority, b.category.is_empty(), &b.category))
            }),
            GroupMode::Category => sorted.sort_by(|a, b| {
                (a.category.is_empty(), &a.category, &a.priority)
                    .cmp(&(b.category.is_empty(), &b.category, &b.priority))
            }),
        }
        sorted.sort_by_key(|t| t.completed);
        sorted
    }

    /// Drop categories no live todo references anymore.
    fn cleanup_unused_categories(&mut self) {
        let used: BTreeSet<String> = self
            .todos
            .iter()
            .filter(|t| !t.category.is_empty())
            .map(|t| t.category.clone())
            .collect();
        if used.len() != self.categories.len() {
            self.categories = used;
        }
    }

    /// Best-effort cache write; failures are logged, never surfaced.
    fn persist(&self) {
        let mut content = String::new();
        for todo in &self.todos {
            content.push_str(&format_line(todo));
            content.push('\n');
        }
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = self.cache_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.cache_path, content)
        })();
        if let Err(e) = result {
            error!("[todos] {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, TodoStore) {
        let dir = TempDir::new().unwrap();
        let store = TodoStore::load(dir.path().join("todos.txt"));
        (dir, store)
    }

    fn todo(text: &str, completed: bool, category: &str, priority: &str) -> Todo {
        Todo {
            text: text.into(),
            completed,
            category: category.into(),
            deadline: String::new(),
            priority: priority.into(),
        }
    }

    #[test]
    fn pipe_format_roundtrip_is_field_for_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.txt");
        let originals = vec![
            todo("water the plants", false, "home", "P2"),
            todo("review merge request", true, "work", "P1"),
            todo("no category here", false, "", "P4"),
        ];
        {
            let mut store = TodoStore::load(path.clone());
            for t in &originals {
                store.add(&t.text, &t.category, &t.priority);
            }
            store.toggle(1);
        }

        let reloaded = TodoStore::load(path);
        assert_eq!(reloaded.todos(), &originals[..]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.txt");
        fs::write(&path, "just some garbage\na|false|b|c|P1\n").unwrap();
        let store = TodoStore::load(path);
        assert_eq!(store.todos().len(), 1);
        assert_eq!(store.todos()[0].text, "a");
    }

    #[test]
    fn completed_items_always_sort_last() {
        let (_dir, mut store) = store();
        store.add("done early", "", "P1");
        store.add("still open", "", "P3");
        store.toggle(0);

        let sorted = store.sorted_for_display();
        assert_eq!(sorted[0].text, "still open");
        assert_eq!(sorted[1].text, "done early");
    }

    #[test]
    fn priority_mode_groups_by_priority_then_category() {
        let (_dir, mut store) = store();
        store.add("c", "work", "P2");
        store.add("a", "", "P1");
        store.add("b", "home", "P1");

        store.set_group_mode(GroupMode::Priority);
        let texts: Vec<_> = store
            .sorted_for_display()
            .into_iter()
            .map(|t| t.text)
            .collect();
        // P1 first; within P1 the categorized item precedes the bare one.
        assert_eq!(texts, vec!["b", "a", "c"]);
    }

    #[test]
    fn category_mode_groups_by_category_then_priority() {
        let (_dir, mut store) = store();
        store.add("bare", "", "P1");
        store.add("w2", "work", "P2");
        store.add("h", "home", "P3");
        store.add("w1", "work", "P1");

        store.set_group_mode(GroupMode::Category);
        let texts: Vec<_> = store
            .sorted_for_display()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["h", "w1", "w2", "bare"]);
    }

    #[test]
    fn removing_last_of_a_category_drops_it() {
        let (_dir, mut store) = store();
        store.add("a", "errands", "P4");
        store.add("b", "work", "P4");
        assert!(store.categories().contains("errands"));

        store.remove(0);
        assert!(!store.categories().contains("errands"));
        assert!(store.categories().contains("work"));
    }

    #[test]
    fn blank_text_is_rejected() {
        let (_dir, mut store) = store();
        assert!(!store.add("   ", "x", "P1"));
        assert!(store.todos().is_empty());
    }
}
