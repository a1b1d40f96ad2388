//! Notification events and their rendered French copy.
//!
//! Event ids are deterministic strings derived from row ids so that a
//! redispatch or an admin replay collapses onto the delivery tuples already
//! recorded for the event instead of minting new ones.

use db::models::{
    artisan::Artisan,
    booking::Booking,
    lead::Lead,
    message::{Message, MessageSender},
    notification::NotificationChannel,
    review::Review,
};

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    /// Confirmation to the client that their devis request was recorded.
    LeadReceived { lead: Lead },
    /// A lead was offered to an artisan.
    LeadAssigned {
        assignment_id: uuid::Uuid,
        lead: Lead,
        artisan: Artisan,
    },
    /// The artisan accepted the offer; the client is told who will contact them.
    AssignmentAccepted {
        assignment_id: uuid::Uuid,
        lead: Lead,
        artisan: Artisan,
    },
    /// The artisan declined; the client is told the search continues.
    AssignmentDeclined {
        assignment_id: uuid::Uuid,
        lead: Lead,
        artisan: Artisan,
    },
    /// An unanswered offer lapsed.
    AssignmentExpired {
        assignment_id: uuid::Uuid,
        lead: Lead,
        artisan: Artisan,
    },
    /// An intervention was scheduled from an accepted assignment.
    BookingScheduled {
        booking: Booking,
        lead: Lead,
        artisan: Artisan,
    },
    /// New chat message; the other party is notified.
    MessagePosted {
        message: Message,
        lead: Lead,
        artisan: Artisan,
    },
    /// A moderated review went live on the artisan's profile.
    ReviewApproved { review: Review, artisan: Artisan },
}

impl NotificationEvent {
    pub fn event_id(&self) -> String {
        match self {
            Self::LeadReceived { lead } => format!("lead_received:{}", lead.id),
            Self::LeadAssigned { assignment_id, .. } => format!("lead_assigned:{assignment_id}"),
            Self::AssignmentAccepted { assignment_id, .. } => {
                format!("assignment_accepted:{assignment_id}")
            }
            Self::AssignmentDeclined { assignment_id, .. } => {
                format!("assignment_declined:{assignment_id}")
            }
            Self::AssignmentExpired { assignment_id, .. } => {
                format!("assignment_expired:{assignment_id}")
            }
            Self::BookingScheduled { booking, .. } => format!("booking_scheduled:{}", booking.id),
            Self::MessagePosted { message, .. } => format!("message_posted:{}", message.id),
            Self::ReviewApproved { review, .. } => format!("review_approved:{}", review.id),
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Self::LeadReceived { lead } => {
                format!("Votre demande de devis {} est bien enregistrée", lead.reference)
            }
            Self::LeadAssigned { lead, .. } => {
                format!("Nouvelle demande de devis {} dans votre secteur", lead.reference)
            }
            Self::AssignmentAccepted { artisan, .. } => {
                format!("{} va vous contacter pour votre projet", artisan.company_name)
            }
            Self::AssignmentDeclined { lead, .. } => {
                format!("Recherche d'artisan en cours pour {}", lead.reference)
            }
            Self::AssignmentExpired { lead, .. } => {
                format!("La demande {} n'est plus disponible", lead.reference)
            }
            Self::BookingScheduled { booking, .. } => format!(
                "Intervention planifiée le {}",
                booking.scheduled_for.format("%d/%m/%Y")
            ),
            Self::MessagePosted { lead, .. } => {
                format!("Nouveau message concernant la demande {}", lead.reference)
            }
            Self::ReviewApproved { .. } => "Un nouvel avis a été publié sur votre profil".to_string(),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Self::LeadReceived { lead } => format!(
                "Bonjour {},\n\nVotre demande de devis ({}) pour des travaux de {} à {} a bien \
                 été enregistrée. Nous la transmettons aux artisans vérifiés de votre secteur ; \
                 vous serez averti dès qu'un professionnel accepte votre projet.\n\n\
                 L'équipe ServicesArtisans",
                lead.client_name, lead.reference, lead.category, lead.city
            ),
            Self::LeadAssigned { lead, artisan, .. } => format!(
                "Bonjour {},\n\nUne nouvelle demande de devis ({}) vient d'être publiée dans \
                 votre secteur : {} à {} ({}).\n\nDescription du projet :\n{}\n\nConnectez-vous \
                 à votre espace artisan pour accepter ou refuser cette demande.",
                artisan.contact_name,
                lead.reference,
                lead.category,
                lead.city,
                lead.department,
                lead.description
            ),
            Self::AssignmentAccepted { lead, artisan, .. } => format!(
                "Bonjour {},\n\nBonne nouvelle : l'entreprise {} a accepté votre demande de \
                 devis {}. Elle vous contactera prochainement au sujet de votre projet de {}.",
                lead.client_name, artisan.company_name, lead.reference, lead.category
            ),
            Self::AssignmentDeclined { lead, .. } => format!(
                "Bonjour {},\n\nUn artisan consulté n'est pas disponible pour votre demande {}. \
                 Votre projet reste proposé aux autres professionnels de votre secteur.",
                lead.client_name, lead.reference
            ),
            Self::AssignmentExpired { artisan, lead, .. } => format!(
                "Bonjour {},\n\nLa demande de devis {} que nous vous avions proposée est restée \
                 sans réponse et a été réattribuée.",
                artisan.contact_name, lead.reference
            ),
            Self::BookingScheduled { booking, lead, artisan } => format!(
                "L'intervention pour la demande {} est planifiée le {} avec {}.",
                lead.reference,
                booking.scheduled_for.format("%d/%m/%Y à %H:%M"),
                artisan.company_name
            ),
            Self::MessagePosted { message, lead, .. } => format!(
                "Vous avez reçu un nouveau message concernant la demande {} :\n\n{}",
                lead.reference, message.body
            ),
            Self::ReviewApproved { review, artisan } => format!(
                "Bonjour {},\n\nUn avis client ({}/5) vient d'être publié sur votre profil.",
                artisan.contact_name, review.rating
            ),
        }
    }

    /// The (channel, recipient) tuples this event fans out to. The webhook
    /// channel is appended by the notifier when an endpoint is configured.
    pub fn recipients(&self) -> Vec<(NotificationChannel, String)> {
        match self {
            Self::LeadReceived { lead } => {
                vec![(NotificationChannel::Email, lead.client_email.clone())]
            }
            Self::LeadAssigned { artisan, .. } => {
                let mut out = vec![
                    (NotificationChannel::Email, artisan.email.clone()),
                    (NotificationChannel::InApp, artisan_inbox(artisan)),
                ];
                if let Some(phone) = &artisan.phone {
                    out.push((NotificationChannel::Sms, phone.clone()));
                }
                out
            }
            Self::AssignmentAccepted { lead, .. } => {
                let mut out = vec![(NotificationChannel::Email, lead.client_email.clone())];
                if let Some(phone) = &lead.client_phone {
                    out.push((NotificationChannel::Sms, phone.clone()));
                }
                out
            }
            Self::AssignmentDeclined { lead, .. } => {
                vec![(NotificationChannel::Email, lead.client_email.clone())]
            }
            Self::AssignmentExpired { artisan, .. } => {
                vec![(NotificationChannel::InApp, artisan_inbox(artisan))]
            }
            Self::BookingScheduled { lead, artisan, .. } => vec![
                (NotificationChannel::Email, lead.client_email.clone()),
                (NotificationChannel::Email, artisan.email.clone()),
                (NotificationChannel::InApp, artisan_inbox(artisan)),
            ],
            Self::MessagePosted { message, lead, artisan } => match message.sender {
                MessageSender::Client => vec![
                    (NotificationChannel::Email, artisan.email.clone()),
                    (NotificationChannel::InApp, artisan_inbox(artisan)),
                ],
                MessageSender::Artisan => {
                    vec![(NotificationChannel::Email, lead.client_email.clone())]
                }
            },
            Self::ReviewApproved { artisan, .. } => vec![
                (NotificationChannel::Email, artisan.email.clone()),
                (NotificationChannel::InApp, artisan_inbox(artisan)),
            ],
        }
    }
}

/// In-app inbox key for an artisan.
pub fn artisan_inbox(artisan: &Artisan) -> String {
    format!("artisan:{}", artisan.id)
}
