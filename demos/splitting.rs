use std::sync::Arc;

use beatsplit::forcing;
use beatsplit::prelude::*;

fn main() {
    let n = 10;

    // FitzHugh-Nagumo tissue with twice as conductive extracellular space
    let mut desc = CardiacModelDescriptor::new(
        BoxMesh::unit_cube(n, n, n).unwrap(),
        Conductivity::Isotropic(1.0),
        Conductivity::Isotropic(2.0),
        Arc::new(FitzHughNagumo::new()),
    );
    // stimulate one corner for the first millisecond
    desc.stimulus = Some(forcing::from_fn(|t, x| {
        if t < 1.0 && x.iter().all(|&xi| xi < 0.2) {
            50.0
        } else {
            0.0
        }
    }));
    let heart = CardiacModel::new(desc).unwrap();

    let mut basic_params = BasicSplittingParameters::default();
    basic_params.verbose = true;
    let mut params = SplittingParameters::default();
    params.verbose = true;

    let interval = (0.0, 2.0);
    let dt = 0.1;

    println!(
        "\n-- General Simulation Info --\n\
        # of vertices:  {}\n\
        Δt:             {:<9.2e} ms\n\
        T:              {:<9.2e} ms\n",
        heart.domain().num_vertices(),
        dt,
        interval.1,
    );

    println!("-- Basic solver --");
    let mut basic = SplittingSolver::basic(&heart, basic_params).unwrap();
    basic.solve(interval, dt).unwrap().run().unwrap();

    println!("-- Optimised solver --");
    let mut optimised = SplittingSolver::optimised(&heart, params).unwrap();
    let mut steps = optimised.solve(interval, dt).unwrap();
    #[cfg(feature = "hdf5")]
    let mut writer = beatsplit::output::SnapshotWriter::create(
        beatsplit::output::SaveSettings {
            filename: "data/splitting.h5",
            save_type: beatsplit::output::SaveType::Potentials,
            overwrite: true,
        },
        &steps.fields(),
        steps.num_steps(),
        dt,
    )
    .unwrap();
    while let Some(step) = steps.next_step() {
        let (_interval, _fields) = step.unwrap();
        #[cfg(feature = "hdf5")]
        writer.write(_interval, &_fields).unwrap();
    }
    drop(steps);

    let a = basic.solution_fields();
    let b = optimised.solution_fields();
    println!(
        "\n-- Results --\n\
        |v| basic:      {:.6e}\n\
        |v| optimised:  {:.6e}\n\
        |u| basic:      {:.6e}\n\
        |u| optimised:  {:.6e}",
        a.vu.component(0).dot(&a.vu.component(0)).sqrt(),
        b.vu.component(0).dot(&b.vu.component(0)).sqrt(),
        a.vu.component(1).dot(&a.vu.component(1)).sqrt(),
        b.vu.component(1).dot(&b.vu.component(1)).sqrt(),
    );
}
