//! Scope Semantics Integration Tests
//!
//! Exercises scope entry, naming, reuse and getter composition through the
//! public API, against the in-memory store.

use std::cell::RefCell;
use std::rc::Rc;
use varscope_core::{
    DataType, Error, FixedSizePartitioner, Initializer, MemoryStore, MinMaxPartitioner, NameScopeStack,
    Regularizer, Result, Reuse, ScopeConfig, ScopeOptions, ScopeStore, VariableOptions, VariableRequest,
    collections, getter_fn,
};

fn full_name(scopes: &ScopeStore) -> Result<String> {
    Ok(scopes.current().full_name().to_string())
}

fn shaped() -> VariableOptions {
    VariableOptions::new().shape([2, 2])
}

// ============================================================================
// Path composition
// ============================================================================

#[test]
fn test_nested_path_composition() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();

    let w = scopes
        .enter("a", ScopeOptions::new(), |s| {
            s.enter("b", ScopeOptions::new(), |s| s.get_variable(&store, "w", shaped()))
        })
        .unwrap();

    assert_eq!(w.name, "a/b/w");
    assert_eq!(w.local_name(), "w");
}

#[test]
fn test_empty_root_name_leaves_path_unchanged() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();

    let w = scopes
        .enter("", ScopeOptions::new(), |s| s.get_variable(&store, "w", shaped()))
        .unwrap();

    assert_eq!(w.name, "w");
}

#[test]
fn test_reentering_same_name_shares_variables() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();

    let first = scopes
        .enter("shared", ScopeOptions::new(), |s| s.get_variable(&store, "w", shaped()))
        .unwrap();
    let second = scopes
        .enter("shared", ScopeOptions::new().reuse(Reuse::ReuseExistingOnly), |s| {
            s.get_variable(&store, "w", VariableOptions::new())
        })
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(store.len(), 1);
}

// ============================================================================
// Default names and counters
// ============================================================================

#[test]
fn test_default_name_uniqueness() {
    let scopes = ScopeStore::new();
    let names: Vec<String> = (0..3)
        .map(|_| {
            scopes
                .enter("layer", ScopeOptions::new().default_name(), full_name)
                .unwrap()
        })
        .collect();

    assert_eq!(names, vec!["layer", "layer_1", "layer_2"]);
}

#[test]
fn test_default_names_below_parent() {
    let scopes = ScopeStore::new();
    let names = scopes
        .enter("model", ScopeOptions::new(), |s| {
            let first = s.enter("dense", ScopeOptions::new().default_name(), full_name)?;
            let second = s.enter("dense", ScopeOptions::new().default_name(), full_name)?;
            Ok::<_, Error>((first, second))
        })
        .unwrap();

    assert_eq!(names, ("model/dense".to_string(), "model/dense_1".to_string()));
}

#[test]
fn test_counter_reset_on_reentry() {
    let scopes = ScopeStore::new();

    let inner = scopes
        .enter("a", ScopeOptions::new(), |s| {
            let first = s.enter("x", ScopeOptions::new().default_name(), full_name)?;
            let second = s.enter("x", ScopeOptions::new().default_name(), full_name)?;
            Ok::<_, Error>(vec![first, second])
        })
        .unwrap();
    assert_eq!(inner, vec!["a/x", "a/x_1"]);

    let again = scopes
        .enter("a", ScopeOptions::new(), |s| {
            s.enter("x", ScopeOptions::new().default_name(), full_name)
        })
        .unwrap();
    assert_eq!(again, "a/x");
    assert_eq!(scopes.scope_count("a"), 2);
}

#[test]
fn test_empty_name_keeps_sibling_default_names_distinct() {
    let scopes = ScopeStore::new();

    let names = scopes
        .enter("a", ScopeOptions::new(), |s| {
            let first = s.enter("x", ScopeOptions::new().default_name(), full_name)?;
            let unnamed = s.enter("", ScopeOptions::new(), full_name)?;
            let second = s.enter("x", ScopeOptions::new().default_name(), full_name)?;
            Ok::<_, Error>(vec![first, unnamed, second])
        })
        .unwrap();

    assert_eq!(names, vec!["a/x", "a", "a/x_1"]);
    assert_eq!(scopes.scope_count("a"), 1);
}

#[test]
fn test_explicit_names_count_toward_defaults() {
    let scopes = ScopeStore::new();
    scopes.enter("block", ScopeOptions::new(), full_name).unwrap();

    let name = scopes
        .enter("block", ScopeOptions::new().default_name(), full_name)
        .unwrap();
    assert_eq!(name, "block_1");
}

#[test]
fn test_enter_with_scope_restores_whole_counter_table() {
    let scopes = ScopeStore::new();
    let a = scopes.enter("a", ScopeOptions::new(), |s| Ok::<_, Error>(s.current())).unwrap();
    let b = scopes.enter("b", ScopeOptions::new(), |s| Ok::<_, Error>(s.current())).unwrap();
    assert_eq!(scopes.scope_count("a"), 1);
    assert_eq!(scopes.scope_count("b"), 1);

    // Re-entering an existing scope rolls back every count touched inside it,
    // including paths outside its subtree.
    scopes
        .enter_with_scope(&a, ScopeOptions::new(), |s| {
            s.enter_with_scope(&b, ScopeOptions::new(), |_| Ok::<_, Error>(()))
        })
        .unwrap();
    assert_eq!(scopes.scope_count("a"), 2);
    assert_eq!(scopes.scope_count("b"), 1);

    // Entering by name only clears its own descendants.
    scopes
        .enter("a", ScopeOptions::new(), |s| {
            s.enter_with_scope(&b, ScopeOptions::new(), |_| Ok::<_, Error>(()))
        })
        .unwrap();
    assert_eq!(scopes.scope_count("a"), 3);
    assert_eq!(scopes.scope_count("b"), 2);
}

#[test]
fn test_enter_with_scope_rolls_back_default_names() {
    let scopes = ScopeStore::new();
    let a = scopes.enter("a", ScopeOptions::new(), |s| Ok::<_, Error>(s.current())).unwrap();

    for _ in 0..2 {
        let name = scopes
            .enter_with_scope(&a, ScopeOptions::new(), |s| {
                s.enter("x", ScopeOptions::new().default_name(), full_name)
            })
            .unwrap();
        assert_eq!(name, "a/x");
    }
}

// ============================================================================
// Reuse
// ============================================================================

#[test]
fn test_default_name_with_reuse_existing_only_fails() {
    let scopes = ScopeStore::new();
    for name in ["layer", "", "a/b"] {
        let result = scopes.enter(
            name,
            ScopeOptions::new().default_name().reuse(Reuse::ReuseExistingOnly),
            full_name,
        );
        assert!(matches!(result, Err(Error::Argument(_))), "name {:?}", name);
    }
    assert_eq!(scopes.current().full_name(), "");
}

#[test]
fn test_default_name_inside_reusing_scope_is_allowed() {
    let scopes = ScopeStore::new();
    let name = scopes
        .enter("outer", ScopeOptions::new().reuse(Reuse::ReuseExistingOnly), |s| {
            s.enter("inner", ScopeOptions::new().default_name(), |s| {
                Ok::<_, Error>((s.current().full_name().to_string(), s.current().reuse()))
            })
        })
        .unwrap();
    assert_eq!(name, ("outer/inner".to_string(), Reuse::ReuseExistingOnly));
}

#[test]
fn test_reuse_mode_is_inherited() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();
    scopes
        .enter("net", ScopeOptions::new(), |s| {
            s.enter("fc", ScopeOptions::new(), |s| s.get_variable(&store, "w", shaped()))
        })
        .unwrap();

    let reused = scopes
        .enter("net", ScopeOptions::new().reuse(Reuse::ReuseExistingOnly), |s| {
            s.enter("fc", ScopeOptions::new(), |s| {
                s.get_variable(&store, "w", VariableOptions::new())
            })
        })
        .unwrap();
    assert_eq!(reused.name, "net/fc/w");

    let missing = scopes.enter("net", ScopeOptions::new().reuse(Reuse::ReuseExistingOnly), |s| {
        s.get_variable(&store, "b", shaped())
    });
    assert!(matches!(missing, Err(Error::Argument(_))));
}

#[test]
fn test_create_new_only_rejects_duplicates() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();
    scopes.get_variable(&store, "w", shaped()).unwrap();
    let err = scopes.get_variable(&store, "w", shaped()).unwrap_err();
    assert!(err.is_argument());
}

#[test]
fn test_shape_and_type_mismatches() {
    let scopes = ScopeStore::new().with_naming(Rc::new(NameScopeStack::new()));
    let store = MemoryStore::new();
    scopes.get_variable(&store, "w", shaped()).unwrap();

    let reuse = || VariableOptions::new().reuse(Reuse::ReuseOrCreateNew);
    let err = scopes
        .get_variable(&store, "w", reuse().shape([3, 3]))
        .unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));

    let err = scopes
        .get_variable(&store, "w", reuse().data_type(DataType::Int32))
        .unwrap_err();
    assert!(matches!(err, Error::DataTypeMismatch { .. }));
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn test_scope_defaults_flow_to_variables() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();
    let options = ScopeOptions::new()
        .data_type(DataType::Float64)
        .initializer(Initializer::Constant { value: 0.5 })
        .regularizer(Regularizer::L2 { scale: 1e-4 })
        .caching_device(|name| format!("/cpu:0/{}", name));

    let w = scopes
        .enter("layer", options, |s| {
            s.enter("inner", ScopeOptions::new(), |s| s.get_variable(&store, "w", shaped()))
        })
        .unwrap();

    assert_eq!(w.data_type, DataType::Float64);
    assert_eq!(w.initializer, Initializer::Constant { value: 0.5 });
    assert_eq!(w.regularizer, Some(Regularizer::L2 { scale: 1e-4 }));
    assert_eq!(w.caching_device.as_deref(), Some("/cpu:0/layer/inner/w"));
    assert!(w.in_collection(collections::REGULARIZATION_LOSSES));
    assert_eq!(store.collection(collections::REGULARIZATION_LOSSES).len(), 1);
}

#[test]
fn test_root_defaults_from_config() {
    let config = ScopeConfig::from_toml_str(
        r#"
        [root]
        reuse = "reuse_or_create_new"
        data_type = "int64"
        "#,
    )
    .unwrap();
    let scopes = ScopeStore::with_config(&config);
    let store = MemoryStore::new();

    let first = scopes.get_variable(&store, "step", VariableOptions::new().shape([1])).unwrap();
    let second = scopes.get_variable(&store, "step", VariableOptions::new()).unwrap();
    assert_eq!(first.data_type, DataType::Int64);
    assert_eq!(first.initializer, Initializer::Zeros);
    assert_eq!(first, second);
}

#[test]
fn test_local_variables() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();
    scopes
        .enter("metrics", ScopeOptions::new(), |s| {
            s.get_local_variable(&store, "count", VariableOptions::new().shape([1]))
        })
        .unwrap();
    scopes.get_variable(&store, "w", shaped()).unwrap();

    let locals = store.collection(collections::LOCAL_VARIABLES);
    assert_eq!(locals.len(), 1);
    assert_eq!(locals[0].name, "metrics/count");
    assert!(!locals[0].trainable);

    let globals: Vec<String> = store
        .collection(collections::GLOBAL_VARIABLES)
        .into_iter()
        .map(|v| v.name)
        .collect();
    assert_eq!(globals, vec!["w"]);
}

// ============================================================================
// Getters
// ============================================================================

#[test]
fn test_getter_composition_order() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();
    let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    let recording = |label: &'static str| {
        let log = Rc::clone(&log);
        getter_fn(move |request: VariableRequest, base| {
            log.borrow_mut().push(format!("{}:{}", label, request.name));
            base.call(request)
        })
    };

    let w = scopes
        .enter("outer", ScopeOptions::new().getter(recording("g1")), |s| {
            s.enter("inner", ScopeOptions::new().getter(recording("g2")), |s| {
                s.get_variable(&store, "w", shaped())
            })
        })
        .unwrap();

    assert_eq!(*log.borrow(), vec!["g2:outer/inner/w", "g1:outer/inner/w"]);
    assert_eq!(store.variable("outer/inner/w"), Some(w));
}

#[test]
fn test_getter_applies_to_nested_scopes_only_while_active() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();
    let calls = Rc::new(RefCell::new(0));

    let counting = {
        let calls = Rc::clone(&calls);
        getter_fn(move |request, base| {
            *calls.borrow_mut() += 1;
            base.call(request)
        })
    };

    scopes
        .enter("a", ScopeOptions::new().getter(counting), |s| {
            s.enter("b", ScopeOptions::new(), |s| s.get_variable(&store, "w", shaped()))
        })
        .unwrap();
    scopes.get_variable(&store, "v", shaped()).unwrap();

    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn test_getter_short_circuits_store() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();
    let frozen = getter_fn(|mut request: VariableRequest, base| {
        request.trainable = false;
        base.call(request)
    });

    let w = scopes
        .enter("frozen", ScopeOptions::new().getter(frozen), |s| {
            s.get_variable(&store, "w", shaped())
        })
        .unwrap();

    assert!(!w.trainable);
    assert!(store.collection(collections::TRAINABLE_VARIABLES).is_empty());
}

// ============================================================================
// Restoration
// ============================================================================

#[test]
fn test_restoration_under_failure() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();

    let result = scopes.enter("outer", ScopeOptions::new(), |s| {
        let before = s.current().full_name().to_string();
        let failed = s.enter("inner", ScopeOptions::new(), |s| {
            s.get_variable(&store, "w", VariableOptions::new())
        });
        assert!(failed.is_err());
        assert_eq!(s.current().full_name(), before);
        assert_eq!(s.naming().current(), "outer");
        Ok::<_, Error>(())
    });

    assert!(result.is_ok());
    assert_eq!(scopes.current().full_name(), "");
    assert_eq!(scopes.naming().current(), "");
}

#[test]
fn test_restoration_under_panic() {
    let scopes = ScopeStore::new();
    let a = scopes.enter("a", ScopeOptions::new(), |s| Ok::<_, Error>(s.current())).unwrap();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = scopes.enter_with_scope(&a, ScopeOptions::new(), |s| {
            s.enter("x", ScopeOptions::new(), |_| -> Result<()> { panic!("block panicked") })
        });
    }));

    assert!(outcome.is_err());
    assert_eq!(scopes.current().full_name(), "");
    assert_eq!(scopes.scope_count("a/x"), 0);
    assert_eq!(scopes.scope_count("a"), 2);
}

// ============================================================================
// Naming context
// ============================================================================

#[test]
fn test_naming_diverges_from_variable_paths() {
    let scopes = ScopeStore::new();
    let prefixes: Vec<(String, String)> = (0..2)
        .map(|_| {
            scopes
                .enter("a", ScopeOptions::new(), |s| {
                    Ok::<_, Error>((s.current().full_name().to_string(), s.naming().current()))
                })
                .unwrap()
        })
        .collect();

    assert_eq!(prefixes[0], ("a".to_string(), "a".to_string()));
    assert_eq!(prefixes[1], ("a".to_string(), "a_1".to_string()));
}

#[test]
fn test_enter_with_scope_uses_last_segment_for_naming() {
    let scopes = ScopeStore::new();
    let inner = scopes
        .enter("outer", ScopeOptions::new(), |s| {
            s.enter("inner", ScopeOptions::new(), |s| Ok::<_, Error>(s.current()))
        })
        .unwrap();

    let (path, prefix) = scopes
        .enter_with_scope(&inner, ScopeOptions::new(), |s| {
            Ok::<_, Error>((s.current().full_name().to_string(), s.naming().current()))
        })
        .unwrap();

    assert_eq!(path, "outer/inner");
    assert_eq!(prefix, "inner");
}

#[test]
fn test_resolution_ignores_naming_context() {
    let naming = Rc::new(NameScopeStack::new());
    let scopes = ScopeStore::new().with_naming(naming.clone());
    let store = MemoryStore::new();

    let seen = Rc::new(RefCell::new(None));
    let probe = {
        let naming = Rc::clone(&naming);
        let seen = Rc::clone(&seen);
        getter_fn(move |request, base| {
            *seen.borrow_mut() = Some(naming.op_name("read"));
            base.call(request)
        })
    };

    scopes
        .enter("layer", ScopeOptions::new().getter(probe), |s| {
            s.get_variable(&store, "w", shaped())
        })
        .unwrap();

    assert_eq!(seen.borrow().as_deref(), Some("read"));
}

// ============================================================================
// Partitioned variables
// ============================================================================

#[test]
fn test_partitioned_resolution() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();

    let table = scopes
        .enter("emb", ScopeOptions::new().partitioner(FixedSizePartitioner::new(3)), |s| {
            s.get_partitioned_variable(&store, "table", VariableOptions::new().shape([10, 8]))
        })
        .unwrap();

    assert_eq!(table.name, "emb/table");
    assert_eq!(table.partitions, vec![3, 1]);
    let names: Vec<&str> = table.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["emb/table/part_0", "emb/table/part_1", "emb/table/part_2"]);
}

#[test]
fn test_partitioned_resolution_constraints() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();

    let without = scopes.get_partitioned_variable(&store, "t", VariableOptions::new().shape([4, 4]));
    assert!(matches!(without, Err(Error::Argument(_))));

    let pass = getter_fn(|request, base| base.call(request));
    let with_getter = scopes.enter(
        "g",
        ScopeOptions::new()
            .getter(pass)
            .partitioner(FixedSizePartitioner::new(2)),
        |s| s.get_partitioned_variable(&store, "t", VariableOptions::new().shape([4, 4])),
    );
    assert!(matches!(with_getter, Err(Error::Argument(_))));
    assert!(store.is_empty());
}

#[test]
fn test_partitioned_resolution_with_overflowing_shape() {
    let scopes = ScopeStore::new();
    let store = MemoryStore::new();

    let table = scopes
        .enter(
            "emb",
            ScopeOptions::new().partitioner(MinMaxPartitioner::new(2)),
            |s| {
                s.get_partitioned_variable(
                    &store,
                    "t",
                    VariableOptions::new().shape([4_000_000_000, 4_000_000_000, 4_000_000_000]),
                )
            },
        )
        .unwrap();

    assert_eq!(table.partitions, vec![1, 1, 1]);
    assert_eq!(table.iter().count(), 1);
}
