//! Integration coverage for the object model: C3 linearized MRO, the
//! namespace/attribute-visibility rules, and container boundary behavior.

use std::sync::Arc;

use argon_rt::object::dict::Dict;
use argon_rt::object::list::List;
use argon_rt::object::namespace::{AttrFlags, Namespace};
use argon_rt::object::tuple::Tuple;
use argon_rt::object::types::{LifecycleSlots, TypeInfo};
use argon_rt::object::Value;

fn trait_type(name: &str, bases: &[Arc<TypeInfo>]) -> Arc<TypeInfo> {
    TypeInfo::new_user(name, name, "", true, Namespace::new(), bases).expect("valid trait graph")
}

#[test]
fn diamond_inheritance_linearizes_breadth_first_over_bases() {
    let a = trait_type("A", &[]);
    let b = trait_type("B", &[a.clone()]);
    let c = trait_type("C", &[a.clone()]);
    let d = trait_type("D", &[b.clone(), c.clone()]);

    let mro = d.mro();
    let names: Vec<&str> = mro.iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["B", "C", "A"]);
}

#[test]
fn inheriting_from_a_struct_is_rejected() {
    let not_a_trait = TypeInfo::builtin("Int", LifecycleSlots::default());
    let err = TypeInfo::new_user("Bad", "Bad", "", true, Namespace::new(), &[not_a_trait]).unwrap_err();
    assert!(matches!(err, Value::Error(_)));
}

#[test]
fn namespace_const_rebind_is_rejected_but_plain_rebind_succeeds() {
    let ns = Namespace::new();
    ns.declare("PI", Value::Int(3), AttrFlags::PUBLIC | AttrFlags::CONST);
    assert!(ns.set("PI", Value::Int(4)).is_err());
    assert!(matches!(ns.get("PI"), Some(Value::Int(3))));

    ns.declare("counter", Value::Int(0), AttrFlags::PUBLIC);
    assert!(ns.set("counter", Value::Int(1)).is_ok());
    assert!(matches!(ns.get("counter"), Some(Value::Int(1))));
}

#[test]
fn list_negative_index_reaches_the_first_element_and_out_of_range_is_none() {
    let list = List::from_vec(vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
    assert!(matches!(list.get(-3), Some(Value::Int(10))));
    assert!(matches!(list.get(2), Some(Value::Int(30))));
    assert!(list.get(3).is_none());
    assert!(list.get(-4).is_none());
}

#[test]
fn dict_preserves_insertion_order_and_update_does_not_reorder() {
    let dict = Dict::new();
    dict.insert(Value::Str(Arc::new(argon_rt::object::string::ArString::new("a"))), Value::Int(1));
    dict.insert(Value::Str(Arc::new(argon_rt::object::string::ArString::new("b"))), Value::Int(2));
    dict.insert(Value::Str(Arc::new(argon_rt::object::string::ArString::new("a"))), Value::Int(9));

    let keys: Vec<String> = dict
        .items()
        .into_iter()
        .map(|(k, _)| match k {
            Value::Str(s) => s.as_str().to_string(),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(dict.len(), 2);
}

#[test]
fn tuple_round_trips_a_list_snapshot() {
    let list = List::from_vec(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    let tuple = Tuple::new(list.snapshot());
    assert_eq!(tuple.len(), 3);
    assert!(matches!(tuple.get(1), Some(Value::Int(2))));
}
