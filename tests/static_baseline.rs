//! The static baseline picks designs without looking at outcomes.

use candle_core::Device;
use locfind::rollout::RolloutMode;
use locfind::{Config, DesignNetworkType, DesignPolicy, LocationFinding, Sampler};

fn static_experiment() -> (LocationFinding, Sampler) {
    let config = Config::quick().design_network(DesignNetworkType::Static).num_rounds(4);
    let mut sampler = Sampler::new(77, &Device::Cpu);
    let experiment = LocationFinding::new(&config, &mut sampler).unwrap();
    (experiment, sampler)
}

#[test]
fn same_theta_same_designs() {
    let (experiment, mut sampler) = static_experiment();
    let theta = [0.4, 0.6];
    let first = experiment.rollout(3, Some(&theta), RolloutMode::Detached, &mut sampler).unwrap();
    let second = experiment.rollout(3, Some(&theta), RolloutMode::Detached, &mut sampler).unwrap();

    assert_eq!(
        first.designs.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
        second.designs.flatten_all().unwrap().to_vec1::<f32>().unwrap()
    );
    // observations are still random
    assert_ne!(
        first.observations.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
        second.observations.flatten_all().unwrap().to_vec1::<f32>().unwrap()
    );
}

#[test]
fn designs_do_not_depend_on_sources() {
    let (experiment, mut sampler) = static_experiment();
    let near = experiment.rollout(1, Some(&[0.0, 0.0]), RolloutMode::Detached, &mut sampler).unwrap();
    let far = experiment.rollout(1, Some(&[5.0, -5.0]), RolloutMode::Detached, &mut sampler).unwrap();
    assert_eq!(
        near.raw_designs.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
        far.raw_designs.flatten_all().unwrap().to_vec1::<f32>().unwrap()
    );
}

#[test]
fn raw_designs_are_the_table_rows() {
    let (experiment, mut sampler) = static_experiment();
    let trace = experiment.rollout(2, None, RolloutMode::Detached, &mut sampler).unwrap();
    let table = match experiment.policy() {
        DesignPolicy::Static(designs) => designs.table().to_vec3::<f32>().unwrap(),
        other => panic!("expected static policy, got {:?}", other.kind()),
    };
    assert_eq!(trace.raw_designs.dims(), &[2, 4, 1, 2]);
    let raw = trace.raw_designs.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    let row: Vec<f32> = table.into_iter().flatten().flatten().collect();
    assert_eq!(&raw[..row.len()], row.as_slice());
    assert_eq!(&raw[row.len()..], row.as_slice());
}

#[test]
fn random_baseline_is_declared_stochastic() {
    let config = Config::quick().design_network(DesignNetworkType::Random);
    let mut sampler = Sampler::new(1, &Device::Cpu);
    let experiment = LocationFinding::new(&config, &mut sampler).unwrap();
    assert!(experiment.policy().is_stochastic());
    assert!(experiment.policy().parameters().is_empty());

    let a = experiment.rollout(2, Some(&[0.5, 0.5]), RolloutMode::Detached, &mut sampler).unwrap();
    let b = experiment.rollout(2, Some(&[0.5, 0.5]), RolloutMode::Detached, &mut sampler).unwrap();
    assert_ne!(
        a.designs.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
        b.designs.flatten_all().unwrap().to_vec1::<f32>().unwrap()
    );
}
