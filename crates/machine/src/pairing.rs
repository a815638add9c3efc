//! SSP and PIN requests: pick a presentation variant and route it.

use bondkeep_primitives::{Address, ClassOfDevice, PairingVariant, SspVariant};
use rand::Rng;
use tracing::{debug, info};

use crate::constants::{KEYBOARD_PIN_MAX, KEYBOARD_PIN_MIN};
use crate::events::PairingRequest;
use crate::machine::BondStateMachine;

impl BondStateMachine {
    pub(crate) fn handle_ssp_request(&mut self, address: Address, variant: SspVariant, passkey: u32) {
        let (presentation, show_passkey) = variant.presentation();
        self.present(address, presentation, show_passkey.then_some(passkey));
    }

    pub(crate) fn handle_pin_request(
        &mut self,
        address: Address,
        name: Option<String>,
        class_of_device: ClassOfDevice,
        min_16_digits: bool,
    ) {
        let device = self.registry.device(address);
        if let Some(name) = name {
            device.set_name(name);
        }
        device.set_class_of_device(class_of_device);

        // Keyboards display a generated PIN for the user to type.
        if class_of_device.is_keyboard() {
            let pin = rand::rng().random_range(KEYBOARD_PIN_MIN..KEYBOARD_PIN_MAX);
            self.present(address, PairingVariant::DisplayPin, Some(pin));
            return;
        }

        let variant = if min_16_digits {
            PairingVariant::Pin16Digits
        } else {
            PairingVariant::Pin
        };
        self.present(address, variant, None);
    }

    fn present(&self, address: Address, variant: PairingVariant, pin: Option<u32>) {
        let device = self.registry.device(address);
        let name = device.name();
        if device.is_bonding_initiated_locally()
            && self
                .config
                .is_skip_confirmation_accessory(name.as_deref(), device.class_of_device())
        {
            debug!(%address, ?name, "known accessory, confirming pairing without prompt");
            self.collaborators
                .gateway
                .set_pairing_confirmation(address, true);
            return;
        }

        info!(%address, %variant, "pairing request");
        self.collaborators
            .consent
            .on_pairing_request(&PairingRequest {
                address,
                variant,
                pin,
            });
    }
}
