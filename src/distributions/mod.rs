mod gprm;
mod mtgprm;
mod mvn;
mod regression;

pub use gprm::{GaussianProcessRegressionModel, GaussianProcessRegressionModelBuilder};
pub use mtgprm::{
    MultiTaskGaussianProcessRegressionModel, MultiTaskGaussianProcessRegressionModelBuilder,
};
pub use mvn::MultivariateNormal;
