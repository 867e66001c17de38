//! Property tests for the checker and the compile pipeline.

mod common;

use common::crossref;
use litquery_compiler::{check, compile_with_snapshot, CompileOptions, IssueCode};
use litquery_expr::builder::{any_of, exists, missing, phrase, token};
use litquery_expr::{normalize, Atom, Expr};
use proptest::prelude::*;

const DECLARED: [&str; 7] = ["title", "lang", "published", "issued", "retracted", "doi", "type"];

fn undeclared_field() -> impl Strategy<Value = String> {
    "[a-z]{3,12}".prop_filter("field must be undeclared", |f| !DECLARED.contains(&f.as_str()))
}

fn atom_on(field: String) -> impl Strategy<Value = Atom> {
    prop_oneof![
        "[a-z ]{0,20}".prop_map({
            let field = field.clone();
            move |text| phrase(field.clone(), text)
        }),
        prop::collection::vec("[a-z]{1,4}", 0..4).prop_map({
            let field = field.clone();
            move |values| any_of(field.clone(), values)
        }),
        any::<bool>().prop_map({
            let field = field.clone();
            move |present| if present { exists(field.clone()) } else { missing(field.clone()) }
        }),
        "[0-9]{1,6}".prop_map(move |value| token(field.clone(), "doi", value)),
    ]
}

fn negatable(atom: Atom) -> impl Strategy<Value = Atom> {
    any::<bool>().prop_map(move |negated| atom.clone().with_negated(negated))
}

proptest! {
    #[test]
    fn undeclared_field_always_errors(
        atom in undeclared_field().prop_flat_map(atom_on).prop_flat_map(negatable)
    ) {
        let field = atom.field.clone();
        let issues = check(&Expr::from(atom), &crossref(), false);
        prop_assert!(issues
            .iter()
            .any(|i| i.is_error()
                && i.code == IssueCode::FieldNotSupported
                && i.context.get("field") == Some(&field)));
    }

    #[test]
    fn rejected_results_never_carry_a_query(
        atoms in prop::collection::vec(
            undeclared_field().prop_flat_map(atom_on),
            1..4,
        ),
        titles in prop::collection::vec("[a-z]{1,10}", 0..3),
    ) {
        let mut children: Vec<Expr> = atoms.into_iter().map(Expr::from).collect();
        children.extend(titles.into_iter().map(|t| Expr::from(phrase("title", t))));
        let expr = Expr::or(children);

        let result = compile_with_snapshot(&expr, &crossref(), &CompileOptions::default()).unwrap();
        prop_assert!(!result.is_ok());
        prop_assert!(result.query.is_empty());
        prop_assert!(result.params.is_empty());
    }

    #[test]
    fn compiled_tree_is_the_normalized_tree(
        titles in prop::collection::vec("[a-z]{1,10}", 1..5),
        with_true in any::<bool>(),
    ) {
        let mut children: Vec<Expr> = titles.into_iter().map(|t| Expr::from(phrase("title", t))).collect();
        if with_true {
            children.push(Expr::truth());
        }
        let expr = Expr::and(children);

        let result = compile_with_snapshot(&expr, &crossref(), &CompileOptions::default()).unwrap();
        prop_assert!(result.is_ok());
        prop_assert_eq!(&result.normalized, &normalize(&expr, false).unwrap());
        for atom in result.normalized.atoms() {
            if let litquery_expr::AtomValue::Term(term) = &atom.value {
                let fragment = format!("title:\"{}\"", term.text);
                prop_assert!(result.query.contains(&fragment));
            }
        }
    }
}
