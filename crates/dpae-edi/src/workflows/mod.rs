pub mod dpae;
