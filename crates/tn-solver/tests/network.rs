//! End-to-end solves of small networks.

use std::sync::Arc;

use tn_components::{
    CharLine, CharParam, ComponentAttr, ComponentKind, DpCharacteristic, ParamKey,
};
use tn_core::{CompId, ConnId};
use tn_fluids::{ClausiusClapeyronWrapper, FluidRegistry, IdealGasWrapper, mixture};
use tn_graph::{ConnectionAttr, PropKey, Reference, Spec};
use tn_solver::{BusBase, Network, NetworkState, NewtonConfig, SolveMode, SolveStatus};

fn registry() -> Arc<FluidRegistry> {
    Arc::new(
        FluidRegistry::new()
            .with(ClausiusClapeyronWrapper::water())
            .with(IdealGasWrapper::nitrogen())
            .with(IdealGasWrapper::oxygen()),
    )
}

/// source -> c1 -> `kind` -> c2 -> sink with a pure fluid on c1.
fn line(fluid: &str, kind: ComponentKind) -> (Network, CompId, ConnId, ConnId) {
    let mut nw = Network::new(registry(), &[fluid]).unwrap();
    let so = nw.add_component("source", ComponentKind::Source).unwrap();
    let comp = nw.add_component("comp", kind).unwrap();
    let si = nw.add_component("sink", ComponentKind::Sink).unwrap();
    let c1 = nw.connect("c1", so, "out1", comp, "in1").unwrap();
    let c2 = nw.connect("c2", comp, "out1", si, "in1").unwrap();
    nw.set_conn_attr(c1, [ConnectionAttr::fluid([(fluid, 1.0)])])
        .unwrap();
    (nw, comp, c1, c2)
}

fn set(nw: &mut Network, id: ConnId, props: &[(PropKey, f64)]) {
    nw.set_conn_attr(
        id,
        props
            .iter()
            .map(|&(k, v)| ConnectionAttr::property(k, v)),
    )
    .unwrap();
}

fn valve_line() -> (Network, CompId, ConnId, ConnId) {
    let (mut nw, valve, c1, c2) = line("water", ComponentKind::Valve);
    set(
        &mut nw,
        c1,
        &[(PropKey::M, 1.0), (PropKey::P, 5e5), (PropKey::T, 300.0)],
    );
    nw.set_comp_attr(valve, [ComponentAttr::param(ParamKey::Pr, 0.8)])
        .unwrap();
    (nw, valve, c1, c2)
}

#[test]
fn throttled_water_keeps_its_enthalpy() {
    let (mut nw, valve, c1, c2) = valve_line();
    assert_eq!(nw.check_degrees_of_freedom().unwrap(), (4, 4));

    let report = nw.solve(SolveMode::Design).unwrap();
    assert!(report.converged());
    assert!(report.residual_rms < 1e-6);

    let inlet = nw.connection(c1).unwrap();
    let outlet = nw.connection(c2).unwrap();
    assert!((outlet.m.val_si - 1.0).abs() < 1e-9);
    assert!((outlet.p.val_si - 4e5).abs() < 1e-6);
    assert!((outlet.h.val_si - inlet.h.val_si).abs() < 1e-6);
    assert!((outlet.fluid().values()[0] - 1.0).abs() < 1e-12);

    let t = mixture::t_mix_ph(outlet.p.val_si, outlet.h.val_si, &outlet.fluid_data(), None)
        .unwrap();
    assert!((outlet.t.val_si - t).abs() < 1e-6);

    let v = nw.component(valve).unwrap();
    assert!((v.value(ParamKey::Pr) - 0.8).abs() < 1e-9);
    assert!(v.value(ParamKey::Zeta) > 0.0);
}

#[test]
fn throttling_a_gas_destroys_exergy() {
    let (mut nw, valve, c1, _) = line("N2", ComponentKind::Valve);
    set(
        &mut nw,
        c1,
        &[(PropKey::M, 1.0), (PropKey::P, 5e5), (PropKey::T, 300.0)],
    );
    nw.set_comp_attr(valve, [ComponentAttr::param(ParamKey::Pr, 0.5)])
        .unwrap();
    assert!(nw.solve(SolveMode::Design).unwrap().converged());

    let sgen = nw.entropy_generation().unwrap();
    let (_, s_valve) = sgen.iter().find(|(l, _)| l == "comp").unwrap();
    assert!(*s_valve > 0.0);

    let exergy = nw.exergy_analysis(1e5, 298.15).unwrap();
    let (_, balance) = exergy.iter().find(|(l, _)| l == "comp").unwrap();
    assert!(balance.destruction > 0.0);
    assert!(balance.product.is_none());
}

#[test]
fn referenced_pressure_sets_the_ratio() {
    let (mut nw, valve, c1, c2) = line("water", ComponentKind::Valve);
    set(
        &mut nw,
        c1,
        &[(PropKey::M, 2.0), (PropKey::P, 1e6), (PropKey::T, 320.0)],
    );
    let half = Reference::new(c1, 0.5, 0.0).unwrap();
    nw.set_conn_attr(c2, [ConnectionAttr::property(PropKey::P, half)])
        .unwrap();

    let report = nw.solve(SolveMode::Design).unwrap();
    assert!(report.converged());
    assert!((nw.connection(c2).unwrap().p.val_si - 5e5).abs() < 1e-6);
    assert!((nw.component(valve).unwrap().value(ParamKey::Pr) - 0.5).abs() < 1e-9);
}

#[test]
fn offdesign_recovers_the_design_flow() {
    let (mut nw, valve, c1, c2) = valve_line();
    nw.set_conn_attr(c1, [ConnectionAttr::Design(vec![PropKey::M])])
        .unwrap();
    nw.set_conn_attr(c2, [ConnectionAttr::Offdesign(vec![PropKey::P])])
        .unwrap();
    nw.set_comp_attr(
        valve,
        [
            ComponentAttr::Design(vec![ParamKey::Pr]),
            ComponentAttr::Offdesign(vec![ParamKey::Zeta]),
        ],
    )
    .unwrap();

    assert!(nw.solve(SolveMode::Design).unwrap().converged());
    let zeta = nw.component(valve).unwrap().value(ParamKey::Zeta);
    assert!(nw.design_state().is_some());

    let report = nw.solve(SolveMode::Offdesign).unwrap();
    assert!(report.converged());
    let inlet = nw.connection(c1).unwrap();
    assert!(!inlet.m.is_set);
    assert!((inlet.m.val_si - 1.0).abs() < 1e-6);
    assert!(nw.connection(c2).unwrap().p.is_set);

    let v = nw.component(valve).unwrap();
    assert!(!v.param(ParamKey::Pr).unwrap().is_set);
    assert!((v.value(ParamKey::Zeta) - zeta).abs() < 1e-6 * zeta);
    assert!((v.value(ParamKey::Pr) - 0.8).abs() < 1e-6);
}

#[test]
fn bus_target_fixes_the_mass_flow() {
    let (mut nw, heater, c1, c2) = line("N2", ComponentKind::SimpleHeatExchanger);
    set(&mut nw, c1, &[(PropKey::P, 2e5), (PropKey::T, 300.0)]);
    set(&mut nw, c2, &[(PropKey::T, 400.0)]);
    nw.set_comp_attr(heater, [ComponentAttr::param(ParamKey::Pr, 1.0)])
        .unwrap();
    let bus = nw.add_bus("heat input").unwrap();
    nw.add_to_bus(bus, heater, 1.0, BusBase::Component).unwrap();
    nw.bus_mut(bus).unwrap().set_target(Some(1e5)).unwrap();

    let report = nw.solve(SolveMode::Design).unwrap();
    assert!(report.converged());

    let data = nw.connection(c1).unwrap().fluid_data();
    let dh = mixture::h_mix_pt(2e5, 400.0, &data).unwrap()
        - mixture::h_mix_pt(2e5, 300.0, &data).unwrap();
    let m = nw.connection(c1).unwrap().m.val_si;
    assert!((m - 1e5 / dh).abs() < 1e-6 * m);
    assert!((nw.bus(bus).unwrap().value() - 1e5).abs() < 1e-3);
    assert!((nw.component(heater).unwrap().value(ParamKey::Q) - 1e5).abs() < 1e-3);
}

#[test]
fn missing_specification_is_a_configuration_error() {
    let (mut nw, _, c1, _) = line("water", ComponentKind::Valve);
    set(
        &mut nw,
        c1,
        &[(PropKey::M, 1.0), (PropKey::P, 5e5), (PropKey::T, 300.0)],
    );
    let err = nw.check_degrees_of_freedom().unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("3 equations for 4 unknowns"));
    assert!(nw.solve(SolveMode::Design).unwrap_err().is_configuration());
}

#[test]
fn over_specification_leaves_the_connection_unchanged() {
    let (mut nw, _, c1, _) = valve_line();
    let err = nw
        .set_conn_attr(c1, [ConnectionAttr::property(PropKey::H, 1e5)])
        .unwrap_err();
    assert!(err.is_configuration());
    let c = nw.connection(c1).unwrap();
    assert!(!c.h.is_set);
    assert!(c.m.is_set && c.p.is_set && c.t.is_set);
}

#[test]
fn unconnected_components_are_rejected() {
    let mut nw = Network::new(registry(), &["water"]).unwrap();
    let so = nw.add_component("source", ComponentKind::Source).unwrap();
    let v = nw.add_component("valve", ComponentKind::Valve).unwrap();
    nw.connect("c1", so, "out1", v, "in1").unwrap();
    assert!(nw.solve(SolveMode::Design).unwrap_err().is_configuration());
}

#[test]
fn iteration_limit_is_reported_not_raised() {
    let (nw, _, _, c2) = valve_line();
    let mut nw = nw.with_config(NewtonConfig::default().with_max_iterations(0));
    let report = nw.solve(SolveMode::Design).unwrap();
    assert_eq!(report.status, SolveStatus::MaxIterations);
    assert_eq!(report.iterations, 0);
    assert!(nw.design_state().is_none());
    assert!(nw.connection(c2).unwrap().t.val_si.is_nan());
}

#[test]
fn state_survives_json_and_loads_into_a_fresh_network() {
    let (mut nw, _, _, _) = valve_line();
    assert!(nw.solve(SolveMode::Design).unwrap().converged());

    let state = nw.state().unwrap();
    let json = state.to_json().unwrap();
    let back = NetworkState::from_json(&json).unwrap();
    assert_eq!(back, state);

    let (mut fresh, valve, c1, _) = line("water", ComponentKind::Valve);
    fresh.apply_state(&back).unwrap();
    let c = fresh.connection(c1).unwrap();
    assert!(c.m.is_set && c.p.is_set && c.t.is_set);
    assert_eq!(fresh.component(valve).unwrap().value(ParamKey::Pr), 0.8);
    assert!(fresh.solve(SolveMode::Design).unwrap().converged());
}

#[test]
fn snapshot_with_other_topology_is_rejected() {
    let (nw, _, _, _) = valve_line();
    let state = nw.state().unwrap();

    let (mut other, _, c1, _) = line("water", ComponentKind::Pump);
    assert!(other.apply_state(&state).is_err());
    assert!(!other.connection(c1).unwrap().m.is_set);
}

/// source -> c1 -> sink carrying 70 % N2 and 30 % O2 at fixed (m, p, h).
fn air_pipe(h: f64) -> (Network, ConnId) {
    let mut nw = Network::new(registry(), &["N2", "O2"]).unwrap();
    let so = nw.add_component("source", ComponentKind::Source).unwrap();
    let si = nw.add_component("sink", ComponentKind::Sink).unwrap();
    let c1 = nw.connect("c1", so, "out1", si, "in1").unwrap();
    nw.set_conn_attr(c1, [ConnectionAttr::fluid([("N2", 0.7), ("O2", 0.3)])])
        .unwrap();
    set(&mut nw, c1, &[(PropKey::M, 1.0), (PropKey::P, 1e5), (PropKey::H, h)]);
    (nw, c1)
}

#[test]
fn irreproducible_mixture_state_still_converges() {
    let (mut nw, c1) = air_pipe(1e9);
    assert_eq!(nw.check_degrees_of_freedom().unwrap(), (0, 0));
    let report = nw.solve(SolveMode::Design).unwrap();
    assert!(report.converged());
    let c = nw.connection(c1).unwrap();
    assert!(c.t.val_si.is_nan());
    assert!(c.s.val_si.is_nan());
    assert!(c.v.val_si.is_nan());
    assert_eq!(c.h.val_si, 1e9);
}

#[test]
fn reproducible_mixture_state_gets_its_temperature() {
    let (blank, c1) = air_pipe(0.0);
    let data = blank.connection(c1).unwrap().fluid_data();
    let h = mixture::h_mix_pt(1e5, 350.0, &data).unwrap();

    let (mut nw, c1) = air_pipe(h);
    assert!(nw.solve(SolveMode::Design).unwrap().converged());
    let c = nw.connection(c1).unwrap();
    assert!((c.t.val_si - 350.0).abs() < 1e-3);
    assert!(c.s.val_si.is_finite());
    assert!(c.v.val_si > 0.0);
}

#[test]
fn composition_fixed_on_both_ends_balances_the_system() {
    let (mut nw, _, _, c2) = valve_line();
    nw.set_conn_attr(c2, [ConnectionAttr::fluid([("water", 1.0)])])
        .unwrap();
    assert_eq!(nw.check_degrees_of_freedom().unwrap(), (3, 3));
    assert!(nw.solve(SolveMode::Design).unwrap().converged());
    assert!((nw.connection(c2).unwrap().p.val_si - 4e5).abs() < 1e-6);
}

#[test]
fn pressure_drop_follows_the_valve_characteristic() {
    let (mut nw, valve, c1, c2) = line("water", ComponentKind::Valve);
    set(
        &mut nw,
        c1,
        &[(PropKey::M, 1.0), (PropKey::P, 5e5), (PropKey::T, 300.0)],
    );
    let dp = CharLine::new(vec![0.0, 2.0], vec![0.0, 2e5]).unwrap();
    nw.set_comp_attr(
        valve,
        [ComponentAttr::DpChar(Some(DpCharacteristic::new(
            dp,
            CharParam::MassFlow,
        )))],
    )
    .unwrap();

    assert!(nw.solve(SolveMode::Design).unwrap().converged());
    assert!((nw.connection(c2).unwrap().p.val_si - 4e5).abs() < 1e-3);
    assert!((nw.component(valve).unwrap().value(ParamKey::Pr) - 0.8).abs() < 1e-9);

    // with the outlet pressure given, the line sets the flow
    nw.set_conn_attr(c1, [ConnectionAttr::property(PropKey::M, Spec::Free)])
        .unwrap();
    set(&mut nw, c2, &[(PropKey::P, 3.5e5)]);
    assert!(nw.solve(SolveMode::Design).unwrap().converged());
    assert!((nw.connection(c1).unwrap().m.val_si - 1.5).abs() < 1e-6);
}
