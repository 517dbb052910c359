pub mod class_names;
