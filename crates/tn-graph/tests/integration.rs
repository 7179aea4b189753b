//! Integration tests for tn-graph.

use tn_core::{CompId, ConnId, Unit, UnitSystem};
use tn_fluids::{ClausiusClapeyronWrapper, FluidRegistry, IdealGasWrapper};
use tn_graph::{
    AttrValue, ColumnFilter, ColumnMap, ColumnTarget, ConnEquation, Connection, ConnectionAttr,
    ConnectionRegistry, ConnectionState, Connector, EquationLedger, GraphError, PropKey, Reference,
    SolveContext,
};

fn fluids() -> FluidRegistry {
    FluidRegistry::new()
        .with(ClausiusClapeyronWrapper::water())
        .with(IdealGasWrapper::nitrogen())
        .with(IdealGasWrapper::oxygen())
}

fn link(label: &str, from: u32, to: u32, names: &[&str]) -> Connection {
    Connection::new(
        label,
        Connector::new(CompId::from_index(from), "out1"),
        Connector::new(CompId::from_index(to), "in1"),
        &UnitSystem::default(),
        &fluids(),
        names,
    )
    .unwrap()
}

fn water_chain() -> (ConnectionRegistry, ConnId, ConnId) {
    let mut reg = ConnectionRegistry::new();
    let c1 = reg.insert(link("c1", 0, 1, &["water"])).unwrap();
    let c2 = reg.insert(link("c2", 1, 2, &["water"])).unwrap();
    for id in [c1, c2] {
        reg.set_attr(id, [ConnectionAttr::fluid([("water", 1.0)])])
            .unwrap();
    }
    (reg, c1, c2)
}

fn evaluate(reg: &mut ConnectionRegistry) -> (ColumnMap, EquationLedger) {
    let mut rows = 0;
    for (_, conn) in reg.iter_mut() {
        conn.reset_solved();
        conn.simplify_specifications().unwrap();
        rows += conn.preprocess();
    }
    let columns = ColumnMap::build(reg);
    let filter = ColumnFilter::all(columns.len());
    let mut ledger = EquationLedger::new(rows);
    let ctx = SolveContext {
        connections: &*reg,
        columns: &columns,
        filter: &filter,
    };
    let mut row = 0;
    for (id, conn) in reg.iter() {
        conn.solve(id, &ctx, row, &mut ledger).unwrap();
        row += conn.equations().len();
    }
    (columns, ledger)
}

#[test]
fn mass_flow_reference_vanishes_on_the_coupling_line() {
    let (mut reg, c1, c2) = water_chain();
    let r = Reference::new(c1, 10.0, 5.0).unwrap();
    reg.set_attr(c2, [ConnectionAttr::property(PropKey::M, r)])
        .unwrap();
    reg.get_mut(c1).unwrap().m.val_si = 2.0;
    reg.get_mut(c2).unwrap().m.val_si = 25.0;
    for (_, c) in reg.iter_mut() {
        c.p.val_si = 1e5;
        c.h.val_si = 1e5;
    }

    let (columns, ledger) = evaluate(&mut reg);
    assert_eq!(ledger.rows(), 1);
    assert_eq!(ledger.residuals(), &[0.0]);

    let m1 = columns.connection(c1).m.unwrap();
    let m2 = columns.connection(c2).m.unwrap();
    assert!(ledger.triplets().contains(&(0, m2, 1.0)));
    assert!(ledger.triplets().contains(&(0, m1, -10.0)));
}

#[test]
fn temperature_reference_derivatives_cover_both_connections() {
    let (mut reg, c1, c2) = water_chain();
    let r = Reference::new(c1, 1.0, -10.0).unwrap();
    reg.set_attr(c2, [ConnectionAttr::property(PropKey::T, r)])
        .unwrap();
    for (_, c) in reg.iter_mut() {
        c.m.val_si = 1.0;
        c.p.val_si = 1e5;
    }
    // liquid: T = 273.16 + h / cp
    reg.get_mut(c1).unwrap().h.val_si = 4186.0 * 50.0;
    reg.get_mut(c2).unwrap().h.val_si = 4186.0 * 40.0;

    let (columns, ledger) = evaluate(&mut reg);
    assert!(ledger.residuals()[0].abs() < 1e-6);
    let h1 = columns.connection(c1).h.unwrap();
    let h2 = columns.connection(c2).h.unwrap();
    let dh: Vec<_> = ledger
        .triplets()
        .iter()
        .filter(|(_, col, _)| *col == h1 || *col == h2)
        .collect();
    assert_eq!(dh.len(), 2);
    for (_, col, d) in dh {
        let expected = if *col == h2 { 1.0 / 4186.0 } else { -1.0 / 4186.0 };
        assert!((d - expected).abs() < 1e-9);
    }
}

#[test]
fn temperature_with_pressure_is_resolved_before_solving() {
    let (mut reg, c1, _) = water_chain();
    reg.set_attr(
        c1,
        [
            ConnectionAttr::property(PropKey::P, 2e5),
            ConnectionAttr::property(PropKey::T, 300.0),
        ],
    )
    .unwrap();
    let (columns, ledger) = evaluate(&mut reg);
    let c = reg.get(c1).unwrap();
    assert!(c.h.solved);
    assert!(c.equations().is_empty());
    assert!(columns.connection(c1).h.is_none());
    assert_eq!(ledger.rows(), 0);
    assert!((c.calc_t().unwrap() - 300.0).abs() < 1e-6);
}

#[test]
fn free_fractions_get_columns_and_balance_rows() {
    let mut reg = ConnectionRegistry::new();
    let id = reg.insert(link("air", 0, 1, &["N2", "O2"])).unwrap();
    reg.set_attr(id, [ConnectionAttr::FluidBalance(true)])
        .unwrap();
    {
        let c = reg.get_mut(id).unwrap();
        c.fluid_mut().set_value(0, 0.8);
        c.fluid_mut().set_value(1, 0.3);
    }
    let (columns, ledger) = evaluate(&mut reg);
    let cols = columns.connection(id);
    assert_eq!(cols.fluid_columns().count(), 2);
    assert!(matches!(
        columns.target(cols.fraction(1).unwrap()),
        Some(ColumnTarget::Fraction(_, 1))
    ));
    assert_eq!(reg.get(id).unwrap().equations(), &[ConnEquation::FluidBalance]);
    assert!((ledger.residuals()[0] + 0.1).abs() < 1e-12);
}

#[test]
fn string_keyed_attributes_match_typed_ones() {
    let (mut reg, c1, _) = water_chain();
    let c = reg.get_mut(c1).unwrap();
    c.set_attr_by_name("p_unit", AttrValue::from("bar")).unwrap();
    c.set_attr_by_name("p", AttrValue::from(3.0)).unwrap();
    assert_eq!(c.p.unit, Unit::Bar);
    assert!((c.p.val_si - 3e5).abs() < 1e-6);
    assert!(matches!(
        c.set_attr_by_name("label", AttrValue::from("x")),
        Err(GraphError::Configuration { .. })
    ));
}

#[test]
fn snapshot_survives_json() {
    let (mut reg, c1, c2) = water_chain();
    reg.set_attr(
        c2,
        [
            ConnectionAttr::property(PropKey::H, Reference::new(c1, 1.0, 0.0).unwrap()),
            ConnectionAttr::Unit(PropKey::T, Unit::Celsius),
            ConnectionAttr::property(PropKey::T, 25.0),
        ],
    )
    .unwrap();
    let state = reg.state_of(c2, "valve", "sink").unwrap();
    let json = serde_json::to_string_pretty(&state).unwrap();
    let back: ConnectionState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state);

    let (mut fresh, _, f2) = water_chain();
    fresh.apply_state(f2, &back).unwrap();
    let c = fresh.get(f2).unwrap();
    assert_eq!(c.t.unit, Unit::Celsius);
    assert!((c.t.val_si - 298.15).abs() < 1e-9);
    assert_eq!(c.reference(PropKey::H).map(|r| r.target()), Some(c1));
}
