// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stable keys for scene storage.
//!
//! Keys are generational: removing a node or record never lets a stale key
//! alias a newer entry.

use slotmap::new_key_type;

new_key_type! {
    /// Key for a scene node (model, curve, plane or point set).
    pub struct NodeKey;

    /// Key for a parameter record.
    pub struct RecordKey;
}
