// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod accounts;
pub mod agents;
pub mod analytics;
pub mod balances;
pub mod categories;
pub mod currencies;
pub mod doctor;
pub mod transactions;
pub mod transfers;
pub mod users;
