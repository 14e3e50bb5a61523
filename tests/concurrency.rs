use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use utter::trie::Node;
use utter::{
    ActiveTags, Command, CommandContext, CommandRegistration, Engine, EngineError,
    InvocationPattern, NodeMatcher,
};

struct Noop;

#[async_trait::async_trait]
impl Command for Noop {
    async fn execute(&mut self, _ctx: &CommandContext) -> anyhow::Result<()> {
        Ok(())
    }
}

fn register(id: &str, phrase: &str) -> CommandRegistration {
    CommandRegistration::new(
        InvocationPattern::new(id, phrase),
        Arc::new(|| Box::new(Noop) as Box<dyn Command>),
    )
}

fn small_set() -> Vec<CommandRegistration> {
    vec![register("a", "alpha one"), register("b", "alpha two")]
}

fn large_set() -> Vec<CommandRegistration> {
    (0..40)
        .map(|i| register(&format!("cmd{}", i), &format!("run task {} {{arg}} now", i)))
        .collect()
}

fn assert_well_formed(node: &Node, is_root: bool) {
    assert_eq!(matches!(node.matcher(), NodeMatcher::Root), is_root);
    assert!(node.is_leaf() || !node.children().is_empty());
    node.children().iter().for_each(|c| assert_well_formed(c, false));
}

#[test]
fn test_readers_only_see_complete_tries() {
    let engine = Arc::new(Engine::default());
    engine.commands_changed(&small_set()).unwrap();

    let small = engine.trie().unwrap().root().size();
    engine.commands_changed(&large_set()).unwrap();
    let large = engine.trie().unwrap().root().size();

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    if let Some(trie) = engine.trie() {
                        assert_well_formed(trie.root(), true);
                        let size = trie.root().size();
                        assert!(size == small || size == large, "partial trie of size {}", size);
                    }
                }
            })
        })
        .collect();

    for round in 0..200 {
        let set = if round % 2 == 0 { small_set() } else { large_set() };
        engine.commands_changed(&set).unwrap();
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(engine.factory().generation(), 202);
}

#[test]
fn test_concurrent_writers_serialize() {
    let engine = Arc::new(Engine::default());
    let writers: Vec<_> = (0..4)
        .map(|w| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..25 {
                    let set = if w % 2 == 0 { small_set() } else { large_set() };
                    engine.commands_changed(&set).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(engine.factory().generation(), 100);
    let trie = engine.trie().unwrap();
    // the table always agrees with the trie of the last writer
    assert_eq!(engine.storage().len(), trie.command_count());
}

#[tokio::test]
async fn test_command_removed_between_match_and_execute() {
    let engine = Engine::default();
    engine.commands_changed(&small_set()).unwrap();

    let recognized = engine.recognize("alpha one", &ActiveTags::new());
    let command = recognized.command.unwrap();

    engine.commands_changed(&[register("b", "alpha two")]).unwrap();

    let err = engine.execute(CommandContext::new(command)).await.unwrap_err();
    assert!(matches!(err, EngineError::CommandNotFound(ref id) if id.as_str() == "a"));

    // the surviving command still runs
    let still = engine.recognize("alpha two", &ActiveTags::new()).command.unwrap();
    engine.execute(CommandContext::new(still)).await.unwrap();
}
