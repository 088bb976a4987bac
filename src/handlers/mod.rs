// handlers/mod.rs - three security tiers
//
// public    no bearer token (signup, password recovery, invitations, webhook)
// protected verified bearer token, role checks happen in the services
// elevated  verified bearer token plus the ADMIN gate

pub mod elevated;
pub mod protected;
pub mod public;
