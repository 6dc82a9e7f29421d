//! Enumerations and populated singleton tables

use std::collections::HashMap;

use bindery::{
    bindable_enumeration, bindable_record, Args, BindError, Binder, Enumeration, Error, Populate,
    Record, SchemaBuilder, Singleton, SingletonSet, ValidationError,
};
use once_cell::sync::Lazy;
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// FIXTURES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Plan {
    quota: u32,
    price: f64,
}

static PLANS: Lazy<SingletonSet<Plan>> = Lazy::new(|| {
    SingletonSet::new([
        ("FREE", Plan { quota: 1, price: 0.0 }),
        ("PRO", Plan { quota: 10, price: 5.0 }),
        ("ENTERPRISE", Plan { quota: 100, price: 50.0 }),
    ])
});

impl Populate for Plan {
    fn schema(s: &mut SchemaBuilder) {
        s.field::<u32>("quota").max(1000.0);
        s.field::<f64>("price").default_double(0.0);
    }

    fn apply(&mut self, args: &mut Args) -> Result<(), BindError> {
        self.quota = args.next()?;
        self.price = args.next()?;
        Ok(())
    }

    fn instances() -> &'static SingletonSet<Self> {
        &PLANS
    }
}

#[derive(Debug, Clone)]
struct Region {
    latency: u32,
}

static REGIONS: Lazy<SingletonSet<Region>> =
    Lazy::new(|| SingletonSet::new([("EU", Region { latency: 50 }), ("US", Region { latency: 80 })]));

impl Populate for Region {
    fn schema(s: &mut SchemaBuilder) {
        s.field::<u32>("latency").min(1.0);
    }

    fn apply(&mut self, args: &mut Args) -> Result<(), BindError> {
        self.latency = args.next()?;
        Ok(())
    }

    fn instances() -> &'static SingletonSet<Self> {
        &REGIONS
    }
}

/// Sealed zones ignore their label, so `apply` leaves an argument unread
#[derive(Debug, Clone)]
struct Zone {
    weight: u32,
    label: Option<String>,
    sealed: bool,
}

static ZONES: Lazy<SingletonSet<Zone>> = Lazy::new(|| {
    SingletonSet::new([
        ("NORTH", Zone { weight: 1, label: None, sealed: false }),
        ("SOUTH", Zone { weight: 2, label: None, sealed: true }),
    ])
});

impl Populate for Zone {
    fn schema(s: &mut SchemaBuilder) {
        s.field::<u32>("weight");
        s.field::<Option<String>>("label");
    }

    fn apply(&mut self, args: &mut Args) -> Result<(), BindError> {
        self.weight = args.next()?;
        if !self.sealed {
            self.label = args.next()?;
        }
        Ok(())
    }

    fn instances() -> &'static SingletonSet<Self> {
        &ZONES
    }
}

#[derive(Debug)]
struct Account {
    owner: String,
    plan: Singleton<Plan>,
}

impl Record for Account {
    fn schema(s: &mut SchemaBuilder) {
        s.field::<String>("owner");
        s.field::<Singleton<Plan>>("plan").default_str("FREE");
    }

    fn construct(args: &mut Args) -> Result<Self, BindError> {
        Ok(Self {
            owner: args.next()?,
            plan: args.next()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Weekday {
    Mon,
    Tue,
    Wed,
}

impl Enumeration for Weekday {
    const VARIANTS: &'static [Self] = &[Weekday::Mon, Weekday::Tue, Weekday::Wed];

    fn name(&self) -> &'static str {
        match self {
            Weekday::Mon => "MON",
            Weekday::Tue => "TUE",
            Weekday::Wed => "WED",
        }
    }
}

#[derive(Debug)]
struct Schedule {
    hours: HashMap<Weekday, u8>,
    first: [Weekday; 2],
}

impl Record for Schedule {
    fn schema(s: &mut SchemaBuilder) {
        s.field::<HashMap<Weekday, u8>>("hours");
        s.field::<[Weekday; 2]>("first");
    }

    fn construct(args: &mut Args) -> Result<Self, BindError> {
        Ok(Self {
            hours: args.next()?,
            first: args.next()?,
        })
    }
}

bindable_record!(Account, Schedule);
bindable_enumeration!(Weekday);

// ═══════════════════════════════════════════
// POPULATION
// ═══════════════════════════════════════════

#[test]
fn test_populate_overwrites_named_instances_in_place() {
    let pro_before = PLANS.get("PRO").unwrap();

    Binder::new()
        .populate::<Plan>(&json!({"pro": {"quota": 20, "price": 7.5}, "FREE": {"quota": 2}}), "plans")
        .unwrap();

    let pro_after = PLANS.get("PRO").unwrap();
    assert!(pro_before.ptr_eq(&pro_after));
    assert_eq!(*pro_before.read(), Plan { quota: 20, price: 7.5 });
    assert_eq!(*PLANS.get("FREE").unwrap().read(), Plan { quota: 2, price: 0.0 });
    assert_eq!(*PLANS.get("ENTERPRISE").unwrap().read(), Plan { quota: 100, price: 50.0 });
}

#[test]
fn test_populate_is_all_or_nothing() {
    let err = Binder::new()
        .populate::<Region>(&json!({"EU": {"latency": 5}, "US": {"latency": 0}}), "regions")
        .unwrap_err();

    match err {
        Error::Validation(ValidationError::ValidationFailed { path, .. }) => {
            assert_eq!(path, "regions.US.latency");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(REGIONS.get("EU").unwrap().read().latency, 50);
}

#[test]
fn test_failed_apply_leaves_earlier_members_untouched() {
    let err = Binder::new()
        .populate::<Zone>(
            &json!({"NORTH": {"weight": 10, "label": "n"}, "SOUTH": {"weight": 20}}),
            "zones",
        )
        .unwrap_err();

    match err {
        Error::Bind(BindError::InternalBinding { record, reason }) => {
            assert_eq!(record, "Zone");
            assert_eq!(reason, "constructor consumed 1 of 2 arguments");
        }
        other => panic!("unexpected error: {other}"),
    }

    let north = ZONES.get("NORTH").unwrap();
    assert_eq!(north.read().weight, 1);
    assert!(north.read().label.is_none());
    assert_eq!(ZONES.get("SOUTH").unwrap().read().weight, 2);
}

#[test]
fn test_populate_rejects_unknown_members() {
    let err = Binder::new()
        .populate::<Region>(&json!({"APAC": {"latency": 3}}), "regions")
        .unwrap_err();

    match err {
        Error::Bind(BindError::InvalidEnumerationValue { value, legal, path }) => {
            assert_eq!(value, "APAC");
            assert_eq!(legal, vec!["EU", "US"]);
            assert_eq!(path, "regions.APAC");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_populate_needs_member_maps() {
    let err = Binder::new().populate::<Region>(&json!(["EU"]), "regions").unwrap_err();
    assert!(matches!(err, Error::Bind(BindError::TypeMismatch { found: "sequence", .. })));

    let err = Binder::new()
        .populate::<Region>(&json!({"EU": 3}), "regions")
        .unwrap_err();
    assert!(matches!(err, Error::Bind(BindError::TypeMismatch { ref path, .. }) if path == "regions.EU"));
}

// ═══════════════════════════════════════════
// SINGLETON FIELDS
// ═══════════════════════════════════════════

#[test]
fn test_singleton_fields_share_the_instance() {
    let account: Account = Binder::new()
        .bind(&json!({"owner": "ada", "plan": "enterprise"}))
        .unwrap();
    assert_eq!(account.owner, "ada");
    assert_eq!(account.plan.name(), "ENTERPRISE");
    assert!(account.plan.ptr_eq(&PLANS.get("ENTERPRISE").unwrap()));

    let account: Account = Binder::new().bind(&json!({"owner": "bob"})).unwrap();
    assert_eq!(account.plan.name(), "FREE");
}

#[test]
fn test_unknown_singleton_name() {
    let err = Binder::new()
        .bind::<Account>(&json!({"owner": "x", "plan": "gold"}))
        .unwrap_err();
    match err {
        Error::Bind(BindError::InvalidEnumerationValue { legal, path, .. }) => {
            assert_eq!(legal, vec!["FREE", "PRO", "ENTERPRISE"]);
            assert_eq!(path, "plan");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ═══════════════════════════════════════════
// ENUMERATIONS
// ═══════════════════════════════════════════

#[test]
fn test_enumerations_as_map_keys_and_array_elements() {
    let schedule: Schedule = Binder::new()
        .bind(&json!({"hours": {"mon": 8, "TUE": "6"}, "first": ["wed", "Mon"]}))
        .unwrap();

    assert_eq!(schedule.hours, HashMap::from([(Weekday::Mon, 8), (Weekday::Tue, 6)]));
    assert_eq!(schedule.first, [Weekday::Wed, Weekday::Mon]);
}

#[test]
fn test_enumeration_needs_a_string() {
    let err = Binder::new().bind::<Weekday>(&json!(3)).unwrap_err();
    assert!(matches!(err, Error::Bind(BindError::TypeMismatch { found: "number", .. })));
}

#[test]
fn test_array_length_is_checked() {
    let err = Binder::new()
        .bind::<Schedule>(&json!({"hours": {}, "first": ["MON"]}))
        .unwrap_err();
    match err {
        Error::Bind(BindError::ArrayLengthMismatch { expected, found, path }) => {
            assert_eq!((expected, found), (2, 1));
            assert_eq!(path, "first");
        }
        other => panic!("unexpected error: {other}"),
    }
}
