//! cpipe-tools: sorties d'une session pour l'extérieur
//!
//! Fournit :
//! - [`export`] : rendus téléchargeables (json / txt / dot), archive zip et source ;
//! - [`visualize`] : contrat de données des scènes 3D (nœuds, arêtes, métadonnées).
//!
//! Points clés :
//! - rendus purs : une session en entrée, des octets ou une scène en sortie ;
//! - aucune E/S ici ; la persistance de l'archive reste au stockage de session.

#![deny(missing_docs)]

pub mod export;
pub mod visualize;

pub use export::{export, export_at, export_source, Artifact, Download, Format, BUNDLE_ENTRIES, BUNDLE_NAME};
pub use visualize::{visualize, visualize_named, Edge3D, Node3D, Scene, View};
