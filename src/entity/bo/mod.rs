pub mod value_bo;
