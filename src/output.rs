//! Saving solution snapshots to HDF5 files.
//!
//! A snapshot file holds a `time` dataset with one entry per saved step and
//! datasets `v` and `u` with one row per saved step. With [`SaveType::Full`] the
//! cell state is stored as well, flattened to one row of `(v, s_1, .., s_k)`
//! tuples per step in the `vs` dataset.

use std::path::{Path, PathBuf};

use ndarray::{s, Array1, Axis};

use crate::{Error, Interval, SolutionFields};

/// How data should be saved to file.
#[derive(Debug)]
pub struct SaveSettings<P: AsRef<Path>> {
    /// The path to the save file.
    pub filename: P,
    /// What information to save.
    pub save_type: SaveType,
    /// Whether or not to overwrite any possible saved data.
    pub overwrite: bool,
}

/// Represents what data to save.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SaveType {
    /// Save the transmembrane and extracellular potentials.
    Potentials,
    /// Save the potentials and the full cell state.
    Full,
}

/// Appends one snapshot per call to an HDF5 file.
pub struct SnapshotWriter {
    filename: PathBuf,
    save_type: SaveType,
    next_row: usize,
}

impl SnapshotWriter {
    /// Prepares the file for `nsteps` more snapshots shaped like `fields`.
    ///
    /// Existing files are extended unless `overwrite` is set.
    pub fn create<P: AsRef<Path>>(
        settings: SaveSettings<P>,
        fields: &SolutionFields,
        nsteps: usize,
        dt: f64,
    ) -> Result<Self, Error> {
        let filename = settings.filename.as_ref();
        let ndofs = fields.vs.ndofs();
        let width = ndofs * fields.vs.num_components();
        let full = settings.save_type == SaveType::Full;

        let next_row = if filename.exists() && !settings.overwrite {
            let file = hdf5::File::append(filename)?;
            let previous_size = file.dataset("time")?.shape()[0];
            file.dataset("time")?.resize(previous_size + nsteps)?;
            file.dataset("v")?.resize((previous_size + nsteps, ndofs))?;
            file.dataset("u")?.resize((previous_size + nsteps, ndofs))?;
            if full {
                if let Ok(vs) = file.dataset("vs") {
                    vs.resize((previous_size + nsteps, width))?;
                } else {
                    file.new_dataset::<f64>()
                        .shape((hdf5::Extent::resizable(previous_size + nsteps), width))
                        .create("vs")?;
                }
            }
            file.close()?;
            previous_size
        } else {
            let file = hdf5::File::create(filename)?;
            file.new_dataset::<f64>()
                .shape(hdf5::Extent::resizable(nsteps))
                .create("time")?;
            file.new_dataset::<f64>()
                .shape((hdf5::Extent::resizable(nsteps), ndofs))
                .create("v")?;
            file.new_dataset::<f64>()
                .shape((hdf5::Extent::resizable(nsteps), ndofs))
                .create("u")?;
            if full {
                file.new_dataset::<f64>()
                    .shape((hdf5::Extent::resizable(nsteps), width))
                    .create("vs")?;
            }

            // save the time step as a file attribute
            let dt_attr = file.new_attr::<f64>()
                .shape(hdf5::Extents::Scalar)
                .create("time_step");
            if let Ok(attr) = dt_attr {
                attr.write_scalar(&dt)?;
            }

            file.close()?;
            0
        };

        Ok(Self {
            filename: filename.to_path_buf(),
            save_type: settings.save_type,
            next_row,
        })
    }

    /// Writes the solution at the end of `interval`.
    pub fn write(&mut self, interval: Interval, fields: &SolutionFields) -> Result<(), Error> {
        let row = self.next_row;
        let file = hdf5::File::open_rw(&self.filename)?;

        let time = file.dataset("time")?;
        if time.shape()[0] <= row {
            let ndofs = fields.vu.ndofs();
            time.resize(row + 1)?;
            file.dataset("v")?.resize((row + 1, ndofs))?;
            file.dataset("u")?.resize((row + 1, ndofs))?;
            if self.save_type == SaveType::Full {
                file.dataset("vs")?.resize((row + 1, ndofs * fields.vs.num_components()))?;
            }
        }

        time.write_slice(Array1::from(vec![interval.1]).view(), s![row..row + 1])?;
        drop(time);
        for (name, component) in [("v", 0), ("u", 1)] {
            // columns of the field are strided, copy into a contiguous row
            let values = fields.vu.component(component).to_owned().insert_axis(Axis(0));
            file.dataset(name)?.write_slice(values.view(), s![row..row + 1, ..])?;
        }
        if self.save_type == SaveType::Full {
            let flat: Array1<f64> = fields.vs.values().iter().copied().collect();
            file.dataset("vs")?
                .write_slice(flat.view().insert_axis(Axis(0)), s![row..row + 1, ..])?;
        }

        file.close()?;
        self.next_row += 1;
        Ok(())
    }
}
