//! Integration tests for schema compilation against on-disk sources.

use std::{fs, path::Path};

use esgen::{
    CompileError, Compiler, MethodKind, SemanticErrorKind, SyntaxErrorKind,
    schema::{error::StateRole, source::DeclarationKind},
};

const ORDERS: &str = r"
events:
  OrderCreated:
    id: OrderId
    lines: billing.Lines
  OrderShipped:
    id: OrderId
    carrier:
      type: Carrier
      doc:
        - Who took the parcel.
        - Empty for pickups.
  OrderCanceled:
    id: OrderId
projections:
  Order:
    states: [Pending, Shipped, Canceled]
    properties:
      id: OrderId
    createOn: OrderCreated
    transitions:
      OrderShipped: [Pending -> Shipped]
      OrderCanceled: [Pending -> Canceled, Shipped -> Canceled]
services:
  Orders:
    projections: [Order]
    methods:
      Create: { in: NewOrder, emits: [OrderCreated] }
      Ship: { in: OrderId, emits: [OrderShipped] }
      Cancel: { in: OrderId, type: append, emits: [OrderCanceled] }
      Get: { in: OrderId, out: billing.Lines }
";

// ============================================================================
// Helpers
// ============================================================================

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A source root declaring every type `ORDERS` references.
fn domain() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "lib.rs",
        "pub mod billing;\n\n/// Order identifier.\npub struct OrderId(String);\n\npub struct NewOrder { pub lines: billing::Lines }\n\n/// Parcel services.\npub enum Carrier { Post, Courier }\n",
    );
    write(root.path(), "billing/mod.rs", "pub type Lines = Vec<u32>;\n");
    // only reachable as `shipping.Carrier`
    write(root.path(), "shipping/mod.rs", "pub struct Carrier;\n");
    write(root.path(), "target/junk.rs", "pub struct OrderId;\n");
    write(root.path(), ".cache/junk.rs", "pub struct OrderId;\n");
    root
}

fn compile(raw: &str, root: &Path) -> Result<esgen::Schema, CompileError> {
    Compiler::new().source_root(root).compile_str(raw)
}

fn semantic(error: &CompileError) -> &SemanticErrorKind {
    error
        .semantic_kind()
        .unwrap_or_else(|| panic!("expected a semantic error, got {error}"))
}

// ============================================================================
// Valid schemas
// ============================================================================

#[test]
fn resolves_types_across_modules() {
    let root = domain();
    let schema = compile(ORDERS, root.path()).unwrap();

    let lines = schema
        .types()
        .find(|ty| ty.reference.to_string() == "billing.Lines")
        .unwrap();
    assert_eq!(lines.kind, DeclarationKind::Alias);
    assert_eq!(lines.location.file, root.path().join("billing/mod.rs"));
    assert_eq!((lines.location.line, lines.location.column), (1, 10));

    let carrier = &schema.event("OrderShipped").unwrap().properties["carrier"];
    assert_eq!(carrier.doc, ["Who took the parcel.", "Empty for pickups."]);
    assert_eq!(schema.type_by_id(carrier.ty).kind, DeclarationKind::Enum);
    assert_eq!(schema.type_by_id(carrier.ty).doc, ["Parcel services."]);

    let id = schema.event("OrderCreated").unwrap().properties["id"].ty;
    assert_eq!(schema.type_by_id(id).doc, ["Order identifier."]);
    // OrderCreated, OrderShipped, OrderCanceled, Order.id, Ship, Cancel, Get
    assert_eq!(schema.type_referrers(id).len(), 7);
}

#[test]
fn compiles_schema_files() {
    let root = domain();
    let file = root.path().join("orders.yaml");
    fs::write(&file, ORDERS).unwrap();

    let schema = Compiler::new()
        .source_root(root.path())
        .compile_file(&file)
        .unwrap();

    let orders = schema.service("Orders").unwrap();
    let kinds: Vec<_> = orders.methods.values().map(|m| (m.name.as_str(), m.kind)).collect();
    assert_eq!(
        kinds,
        [
            ("Create", MethodKind::Transaction),
            ("Ship", MethodKind::Transaction),
            ("Cancel", MethodKind::Append),
            ("Get", MethodKind::Readonly),
        ]
    );

    let order = schema.projection("Order").unwrap();
    assert_eq!(order.initial_state(), "Pending");
    let shipped = schema.event("OrderShipped").unwrap().id;
    let canceled = schema.event("OrderCanceled").unwrap().id;
    assert_eq!(order.next_state(shipped, "Pending"), Some("Shipped"));
    assert_eq!(order.next_state(shipped, "Shipped"), None);
    assert_eq!(order.next_state(canceled, "Shipped"), Some("Canceled"));
    assert_eq!(orders.subscriptions.len(), 3);
}

#[test]
fn compilation_is_deterministic() {
    let root = domain();

    let first = compile(ORDERS, root.path()).unwrap();
    let second = compile(ORDERS, root.path()).unwrap();
    assert_eq!(first, second);

    let names: Vec<_> = first.types().map(|ty| ty.reference.to_string()).collect();
    assert_eq!(
        names,
        ["OrderId", "billing.Lines", "Carrier", "NewOrder"]
    );
}

#[test]
fn compile_free_function_loads_roots() {
    let root = domain();
    let schema = esgen::compile(ORDERS, [root.path()]).unwrap();
    assert_eq!(schema.raw(), ORDERS);
}

// ============================================================================
// Rejected schemas
// ============================================================================

#[test]
fn unresolved_types_are_reported_together() {
    let root = domain();
    write(root.path(), "lib.rs", "pub struct OrderId(String);\n");

    let err = compile(ORDERS, root.path()).unwrap_err();
    assert!(err.path().unwrap().is_root());
    match semantic(&err) {
        SemanticErrorKind::UndefinedTypes(names) => {
            assert_eq!(names, &["Carrier", "NewOrder"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        err.to_string(),
        "semantic error in <schema>: types (Carrier, NewOrder) undefined in source"
    );
}

#[test]
fn types_declared_twice_are_ambiguous() {
    let root = domain();
    write(
        root.path(),
        "lib.rs",
        "pub struct OrderId(String);\npub struct NewOrder;\npub struct Carrier;\npub enum OrderId {}\n",
    );

    let err = compile(ORDERS, root.path()).unwrap_err();
    assert!(matches!(
        semantic(&err),
        SemanticErrorKind::AmbiguousTypes(names) if names == &["OrderId"]
    ));
}

#[test]
fn missing_source_root_is_a_source_error() {
    let root = domain();
    let err = compile(ORDERS, &root.path().join("nope")).unwrap_err();
    assert!(matches!(semantic(&err), SemanticErrorKind::Source(_)));
}

#[test]
fn create_event_cannot_drive_a_transition() {
    let root = domain();
    let raw = ORDERS.replace(
        "      OrderShipped: [Pending -> Shipped]\n",
        "      OrderShipped: [Pending -> Shipped]\n      OrderCreated: [Pending -> Pending]\n",
    );

    let err = compile(&raw, root.path()).unwrap_err();
    assert_eq!(
        err.path().unwrap().to_string(),
        "projections.Order.transitions.OrderCreated"
    );
    match semantic(&err) {
        SemanticErrorKind::CreateOnTransition {
            event,
            create_on,
            transition,
        } => {
            assert_eq!(event, "OrderCreated");
            assert_eq!(create_on.to_string(), "projections.Order.createOn");
            assert_eq!(
                transition.to_string(),
                "projections.Order.transitions.OrderCreated"
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn transitions_must_use_declared_states() {
    let root = domain();
    let raw = ORDERS.replace("[Pending -> Shipped]", "[Pending -> Delivered]");

    let err = compile(&raw, root.path()).unwrap_err();
    assert_eq!(
        err.path().unwrap().to_string(),
        "projections.Order.transitions.OrderShipped"
    );
    assert!(matches!(
        semantic(&err),
        SemanticErrorKind::UndefinedState { role: StateRole::Target, state } if state == "Delivered"
    ));
}

#[test]
fn events_nobody_uses_are_rejected() {
    let root = domain();
    let raw = ORDERS.replace(
        "  OrderCanceled:\n    id: OrderId\n",
        "  OrderCanceled:\n    id: OrderId\n  OrderArchived: {}\n",
    );

    let err = compile(&raw, root.path()).unwrap_err();
    assert_eq!(err.path().unwrap().to_string(), "events.OrderArchived");
    assert!(matches!(
        semantic(&err),
        SemanticErrorKind::UnusedEvent(name) if name == "OrderArchived"
    ));
}

#[test]
fn emitted_events_must_be_declared() {
    let root = domain();
    let raw = ORDERS.replace("emits: [OrderShipped]", "emits: [OrderShipped, OrderLost]");

    let err = compile(&raw, root.path()).unwrap_err();
    assert_eq!(
        err.path().unwrap().to_string(),
        "services.Orders.methods.Ship.emits.1"
    );
    assert!(matches!(
        semantic(&err),
        SemanticErrorKind::UndefinedEvent(name) if name == "OrderLost"
    ));
}

#[test]
fn naming_rules_are_syntax_errors() {
    let root = domain();
    let raw = ORDERS.replace("      Ship: {", "      ship: {");

    let err = compile(&raw, root.path()).unwrap_err();
    assert!(err.is_syntax());
    assert_eq!(err.path().unwrap().to_string(), "services.Orders.methods.ship");
    assert!(matches!(
        err.syntax_kind(),
        Some(SyntaxErrorKind::InvalidName { name, .. }) if name == "ship"
    ));
}

#[test]
fn malformed_documents_are_syntax_errors() {
    let root = domain();
    let err = compile("events: [", root.path()).unwrap_err();
    assert!(matches!(
        err.syntax_kind(),
        Some(SyntaxErrorKind::MalformedDocument(_))
    ));

    let err = compile(&ORDERS.replace("createOn:", "create_on:"), root.path()).unwrap_err();
    assert!(err.is_syntax());
}

#[test]
fn unreadable_schema_file_is_a_read_error() {
    let root = domain();
    let err = Compiler::new()
        .compile_file(root.path().join("missing.yaml"))
        .unwrap_err();
    assert!(matches!(err, CompileError::Read { .. }));
    assert!(err.path().is_none());
}
