use anyhow::Context;
use chrono::{NaiveDate, NaiveTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sehati_core::config::{payment_success_rate_from_env_value, simulated_delay_from_env_value};
use sehati_core::constants::DEFAULT_DATA_DIR;
use sehati_core::models::booking::{
    AppointmentType, NewAppointment, NewRating, PaymentMethod, ServiceType,
};
use sehati_core::models::family::{Gender, NewFamilyMember, Relationship};
use sehati_core::models::follow_up::PatientResponse;
use sehati_core::models::medication::{NewMedicationReminder, ReminderFrequency};
use sehati_core::models::pharmacy::{NewPrescription, NewPrescriptionMedication};
use sehati_core::{
    CoreConfig, EntityId, FileSliceStorage, HealthApp, MemorySliceStorage, SliceStorage, Stars,
    catalog,
};

#[derive(Parser)]
#[command(name = "sehati")]
#[command(about = "Sehati healthcare app state CLI")]
struct Cli {
    /// Keep state in memory only; nothing is read from or written to the data directory
    #[arg(long, global = true)]
    ephemeral: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Doctor appointments
    #[command(subcommand)]
    Appointments(AppointmentCommand),
    /// Wallet balance and ledger
    #[command(subcommand)]
    Wallet(WalletCommand),
    /// In-app notifications
    #[command(subcommand)]
    Notifications(NotificationCommand),
    /// Family members managed from this account
    #[command(subcommand)]
    Family(FamilyCommand),
    /// Medication reminders and dose logs
    #[command(subcommand)]
    Reminders(ReminderCommand),
    /// Post-visit follow-ups
    #[command(subcommand)]
    FollowUps(FollowUpCommand),
    /// Prescriptions for the pharmacy flow
    #[command(subcommand)]
    Prescriptions(PrescriptionCommand),
    /// Pharmacy orders
    #[command(subcommand)]
    Orders(OrderCommand),
    /// Rate a completed service
    Rate {
        #[arg(value_enum)]
        service: ServiceArg,
        service_id: String,
        service_name: String,
        /// One to five
        stars: u8,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Ask the medical assistant a question
    Ask {
        text: String,
    },
    /// Health risks, alerts and recommendations
    Insights {
        /// Alert key to dismiss before listing
        #[arg(long)]
        dismiss: Option<String>,
    },
}

#[derive(Subcommand)]
enum AppointmentCommand {
    /// List appointments
    List {
        /// Only pending or confirmed appointments from today on
        #[arg(long)]
        upcoming: bool,
    },
    /// Book and pay for an appointment
    Book(BookArgs),
    /// Cancel an appointment
    Cancel { id: EntityId },
    /// Mark a visit completed and schedule its follow-up
    Complete { id: EntityId },
}

#[derive(Args)]
struct BookArgs {
    #[arg(long)]
    doctor_id: String,
    #[arg(long)]
    doctor_name: String,
    #[arg(long)]
    specialty: String,
    /// Date (YYYY-MM-DD)
    #[arg(long)]
    date: NaiveDate,
    /// Time (HH:MM)
    #[arg(long, value_parser = parse_time)]
    time: NaiveTime,
    /// Fee in LYD
    #[arg(long)]
    fee: f64,
    #[arg(long, value_enum, default_value = "cash")]
    payment: PaymentArg,
    #[arg(long, value_enum, default_value = "in-person")]
    kind: AppointmentKindArg,
    /// Book on behalf of this family member
    #[arg(long)]
    family_member: Option<EntityId>,
    /// Patient name when booking for yourself
    #[arg(long)]
    patient_name: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Subcommand)]
enum WalletCommand {
    /// Show the balance
    Balance,
    /// Add funds by card or mobile wallet
    TopUp {
        amount: f64,
        #[arg(long, value_enum, default_value = "card")]
        method: PaymentArg,
    },
    /// List ledger entries, newest first
    History,
}

#[derive(Subcommand)]
enum NotificationCommand {
    List,
    Read { id: EntityId },
    ReadAll,
    Clear,
}

#[derive(Subcommand)]
enum FamilyCommand {
    List,
    Add {
        name: String,
        #[arg(value_enum)]
        relationship: RelationshipArg,
        /// Date of birth (YYYY-MM-DD)
        date_of_birth: NaiveDate,
        #[arg(value_enum)]
        gender: GenderArg,
        /// Known allergies (comma-separated)
        #[arg(long, value_delimiter = ',')]
        allergies: Vec<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Remove { id: EntityId },
}

#[derive(Subcommand)]
enum ReminderCommand {
    List,
    Add {
        medication: String,
        dosage: String,
        #[arg(long, value_enum, default_value = "once-daily")]
        frequency: FrequencyArg,
        /// Dose times (HH:MM), repeatable
        #[arg(long = "time", value_parser = parse_time)]
        times: Vec<NaiveTime>,
        #[arg(long, default_value_t = 30)]
        quantity: u32,
        #[arg(long, default_value_t = 5)]
        refill_threshold: u32,
        #[arg(long)]
        family_member: Option<EntityId>,
    },
    /// Log a dose as taken now
    Taken { id: EntityId },
    /// Log a dose as skipped now
    Skipped { id: EntityId },
    Refill { id: EntityId, quantity: u32 },
    Pause { id: EntityId },
    Resume { id: EntityId },
    Delete { id: EntityId },
}

#[derive(Subcommand)]
enum FollowUpCommand {
    /// Follow-ups waiting for your answer
    List,
    Respond {
        id: EntityId,
        #[arg(value_enum)]
        response: ResponseArg,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show the message thread of a follow-up
    Messages { id: EntityId },
}

#[derive(Subcommand)]
enum PrescriptionCommand {
    List,
    /// Upload a paper prescription and wait for pharmacist review
    Upload {
        /// Catalogue medication and quantity as `<id>:<qty>`, repeatable
        #[arg(long = "med", value_parser = parse_med)]
        medications: Vec<(String, u32)>,
        #[arg(long)]
        doctor_name: Option<String>,
        /// Issue date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        issued_on: Option<NaiveDate>,
        #[arg(long)]
        image: Option<String>,
    },
    /// Toggle whether a medication is included in the order
    Toggle { id: EntityId, medication_id: String },
    /// Set the ordered quantity of a medication (clamped to the prescribed maximum)
    Quantity {
        id: EntityId,
        medication_id: String,
        quantity: i64,
    },
    /// Pharmacies ranked by distance with stock for the selection
    Pharmacies { id: EntityId },
    /// Mark prescriptions older than the validity window as expired
    Expire,
}

#[derive(Subcommand)]
enum OrderCommand {
    List,
    /// Show one order with its status history and audit log
    Show { id: EntityId },
    /// Price an order without placing it
    Quote {
        prescription: EntityId,
        pharmacy: String,
    },
    Place {
        prescription: EntityId,
        pharmacy: String,
        #[arg(long, value_enum, default_value = "cash")]
        payment: PaymentArg,
        #[arg(long)]
        address: String,
    },
    /// Retry payment of an order awaiting payment
    Pay { id: EntityId },
    Deliver { id: EntityId },
    Cancel {
        id: EntityId,
        #[arg(long, default_value = "cancelled by patient")]
        reason: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PaymentArg {
    Cash,
    Card,
    Wallet,
    Mobile,
}

impl From<PaymentArg> for PaymentMethod {
    fn from(arg: PaymentArg) -> Self {
        match arg {
            PaymentArg::Cash => PaymentMethod::CashOnDelivery,
            PaymentArg::Card => PaymentMethod::Card,
            PaymentArg::Wallet => PaymentMethod::Wallet,
            PaymentArg::Mobile => PaymentMethod::MobileWallet,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AppointmentKindArg {
    InPerson,
    Video,
    HomeVisit,
}

impl From<AppointmentKindArg> for AppointmentType {
    fn from(arg: AppointmentKindArg) -> Self {
        match arg {
            AppointmentKindArg::InPerson => AppointmentType::InPerson,
            AppointmentKindArg::Video => AppointmentType::Video,
            AppointmentKindArg::HomeVisit => AppointmentType::HomeVisit,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ServiceArg {
    Doctor,
    Clinic,
    Lab,
    Pharmacy,
    Ambulance,
}

impl From<ServiceArg> for ServiceType {
    fn from(arg: ServiceArg) -> Self {
        match arg {
            ServiceArg::Doctor => ServiceType::Doctor,
            ServiceArg::Clinic => ServiceType::Clinic,
            ServiceArg::Lab => ServiceType::Lab,
            ServiceArg::Pharmacy => ServiceType::Pharmacy,
            ServiceArg::Ambulance => ServiceType::Ambulance,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RelationshipArg {
    Spouse,
    Child,
    Parent,
    Sibling,
    Grandparent,
    Other,
}

impl From<RelationshipArg> for Relationship {
    fn from(arg: RelationshipArg) -> Self {
        match arg {
            RelationshipArg::Spouse => Relationship::Spouse,
            RelationshipArg::Child => Relationship::Child,
            RelationshipArg::Parent => Relationship::Parent,
            RelationshipArg::Sibling => Relationship::Sibling,
            RelationshipArg::Grandparent => Relationship::Grandparent,
            RelationshipArg::Other => Relationship::Other,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum GenderArg {
    Male,
    Female,
}

impl From<GenderArg> for Gender {
    fn from(arg: GenderArg) -> Self {
        match arg {
            GenderArg::Male => Gender::Male,
            GenderArg::Female => Gender::Female,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FrequencyArg {
    OnceDaily,
    TwiceDaily,
    ThreeTimesDaily,
    FourTimesDaily,
    EveryOtherDay,
    Weekly,
    AsNeeded,
}

impl From<FrequencyArg> for ReminderFrequency {
    fn from(arg: FrequencyArg) -> Self {
        match arg {
            FrequencyArg::OnceDaily => ReminderFrequency::OnceDaily,
            FrequencyArg::TwiceDaily => ReminderFrequency::TwiceDaily,
            FrequencyArg::ThreeTimesDaily => ReminderFrequency::ThreeTimesDaily,
            FrequencyArg::FourTimesDaily => ReminderFrequency::FourTimesDaily,
            FrequencyArg::EveryOtherDay => ReminderFrequency::EveryOtherDay,
            FrequencyArg::Weekly => ReminderFrequency::Weekly,
            FrequencyArg::AsNeeded => ReminderFrequency::AsNeeded,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ResponseArg {
    Improved,
    Same,
    Worsened,
}

impl From<ResponseArg> for PatientResponse {
    fn from(arg: ResponseArg) -> Self {
        match arg {
            ResponseArg::Improved => PatientResponse::Improved,
            ResponseArg::Same => PatientResponse::Same,
            ResponseArg::Worsened => PatientResponse::Worsened,
        }
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| format!("expected HH:MM: {e}"))
}

fn parse_med(value: &str) -> Result<(String, u32), String> {
    let (id, qty) = value
        .split_once(':')
        .ok_or_else(|| format!("expected <id>:<qty>, got {value}"))?;
    let qty = qty
        .parse::<u32>()
        .map_err(|_| format!("quantity must be a whole number, got {qty}"))?;
    Ok((id.trim().to_owned(), qty))
}

/// Resolve configuration from the environment.
///
/// # Environment Variables
/// - `SEHATI_DATA_DIR`: Directory holding the persisted slices (default: "sehati_data")
/// - `SEHATI_USER_ID`: Signed-in user that owns the wallet and notifications (default: "user-1")
/// - `SEHATI_PAYMENT_SUCCESS_RATE`: Probability in `[0, 1]` that a simulated payment succeeds
/// - `SEHATI_SIMULATED_DELAY_MS`: Latency of the simulated payment gateway and pharmacist
fn config_from_env() -> anyhow::Result<CoreConfig> {
    let data_dir = std::env::var("SEHATI_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
    let user_id = std::env::var("SEHATI_USER_ID").unwrap_or_else(|_| "user-1".into());
    let rate = payment_success_rate_from_env_value(std::env::var("SEHATI_PAYMENT_SUCCESS_RATE").ok())?;
    let delay = simulated_delay_from_env_value(std::env::var("SEHATI_SIMULATED_DELAY_MS").ok())?;

    Ok(CoreConfig::new(PathBuf::from(data_dir), user_id)?
        .with_payment_success_rate(rate)?
        .with_simulated_delay(delay))
}

/// Main entry point for the Sehati CLI
///
/// Opens the four stores over the data directory (or in memory with `--ephemeral`), runs one
/// command against them, and exits. Every mutation is written through to disk as it happens.
///
/// # Environment Variables
/// See [`config_from_env`]. `RUST_LOG` overrides the default `sehati=info` log filter.
///
/// # Returns
/// * `Ok(())` - If the command ran, including commands that were declined by a simulated service
/// * `Err(anyhow::Error)` - If configuration is invalid or a store rejected the command
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("sehati=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = Arc::new(config_from_env()?);

    let storage: Arc<dyn SliceStorage> = if cli.ephemeral {
        Arc::new(MemorySliceStorage::new())
    } else {
        Arc::new(
            FileSliceStorage::open(cfg.data_dir())
                .with_context(|| format!("opening {}", cfg.data_dir().display()))?,
        )
    };
    tracing::debug!("++ Sehati data in {}", cfg.data_dir().display());

    let mut app = HealthApp::with_simulated_services(cfg.clone(), storage);
    let today = Utc::now().date_naive();

    match cli.command {
        Some(Commands::Appointments(cmd)) => appointments(&mut app, cmd, today).await?,
        Some(Commands::Wallet(cmd)) => wallet(&mut app, cmd).await?,
        Some(Commands::Notifications(cmd)) => notifications(&mut app, cmd),
        Some(Commands::Family(cmd)) => family(&mut app, cmd, today)?,
        Some(Commands::Reminders(cmd)) => reminders(&mut app, cmd, today)?,
        Some(Commands::FollowUps(cmd)) => follow_ups(&mut app, cmd).await?,
        Some(Commands::Prescriptions(cmd)) => prescriptions(&mut app, cmd, today).await?,
        Some(Commands::Orders(cmd)) => orders(&mut app, cmd).await?,
        Some(Commands::Rate {
            service,
            service_id,
            service_name,
            stars,
            comment,
        }) => {
            let id = app.submit_rating(NewRating {
                service_type: service.into(),
                service_id,
                service_name,
                stars: Stars::new(stars)?,
                comment,
                verified: true,
            });
            println!("Rating saved: {}", id);
        }
        Some(Commands::Ask { text }) => {
            let reply = app.ask_assistant(&text).await?;
            println!("{}", reply.content);
            for action in &reply.suggested_actions {
                println!("  → {}", action.label);
            }
        }
        Some(Commands::Insights { dismiss }) => {
            app.refresh_health_insights(today);
            if let Some(key) = dismiss {
                if app.dismiss_health_alert(&key) {
                    println!("Dismissed alert {}", key);
                }
            }
            let assistant = app.assistant();
            for risk in assistant.health_risks() {
                println!("[risk:{:?}] {} ({})", risk.level, risk.condition, risk.factors.join("، "));
            }
            for alert in assistant.health_alerts() {
                println!("[alert:{:?}] {} - {} ({})", alert.severity, alert.title, alert.message, alert.key);
            }
            for rec in assistant.recommendations() {
                println!("[{:?}] {}: {}", rec.category, rec.title, rec.description);
            }
        }
        None => {
            println!("Use 'sehati --help' for commands");
        }
    }

    Ok(())
}

async fn appointments(
    app: &mut HealthApp,
    cmd: AppointmentCommand,
    today: NaiveDate,
) -> anyhow::Result<()> {
    match cmd {
        AppointmentCommand::List { upcoming } => {
            let list: Vec<_> = if upcoming {
                app.booking().upcoming_appointments(today)
            } else {
                app.booking().appointments().iter().collect()
            };
            if list.is_empty() {
                println!("No appointments found.");
            }
            for a in list {
                println!(
                    "ID: {}, {} {} with {} ({}), Status: {:?}, Fee: {:.2} LYD",
                    a.id, a.date, a.time, a.doctor_name, a.patient_name, a.status, a.fee
                );
            }
        }
        AppointmentCommand::Book(args) => {
            let (patient_id, patient_name, family_member_id) = match &args.family_member {
                Some(member) => {
                    let draft = app.family_booking_draft(member)?;
                    (draft.patient_id, draft.patient_name, Some(draft.family_member_id))
                }
                None => {
                    let user = app.config().user_id().to_owned();
                    (user.clone(), args.patient_name.unwrap_or(user), None)
                }
            };
            let receipt = app
                .book_appointment(
                    NewAppointment {
                        patient_id,
                        patient_name,
                        family_member_id,
                        doctor_id: args.doctor_id,
                        doctor_name: args.doctor_name,
                        specialty: args.specialty,
                        clinic_id: None,
                        clinic_name: None,
                        date: args.date,
                        time: args.time,
                        appointment_type: args.kind.into(),
                        fee: args.fee,
                        notes: args.notes,
                    },
                    args.payment.into(),
                )
                .await?;
            if receipt.confirmed {
                println!("Booked and confirmed: {}", receipt.appointment_id);
            } else {
                println!("Booked but payment failed, still pending: {}", receipt.appointment_id);
            }
        }
        AppointmentCommand::Cancel { id } => {
            if app.booking_mut().cancel_appointment(&id) {
                println!("Cancelled {}", id);
            } else {
                eprintln!("Appointment not found: {}", id);
            }
        }
        AppointmentCommand::Complete { id } => {
            let follow_up = app.complete_appointment(&id)?;
            println!("Completed {}; follow-up {} scheduled", id, follow_up);
        }
    }
    Ok(())
}

async fn wallet(app: &mut HealthApp, cmd: WalletCommand) -> anyhow::Result<()> {
    match cmd {
        WalletCommand::Balance => {
            println!("{:.2} LYD", app.booking().wallet_balance());
        }
        WalletCommand::TopUp { amount, method } => match app.top_up_wallet(amount, method.into()).await? {
            Some(id) => println!(
                "Topped up {:.2} LYD ({}); balance {:.2} LYD",
                amount,
                id,
                app.booking().wallet_balance()
            ),
            None => println!("Top-up declined"),
        },
        WalletCommand::History => {
            for t in app.booking().transactions() {
                println!(
                    "{} {:?} {:+.2} LYD {}",
                    t.created_at.format("%Y-%m-%d %H:%M"),
                    t.kind,
                    t.signed_amount(),
                    t.description
                );
            }
        }
    }
    Ok(())
}

fn notifications(app: &mut HealthApp, cmd: NotificationCommand) {
    let booking = app.booking_mut();
    match cmd {
        NotificationCommand::List => {
            println!("{} unread", booking.unread_count());
            for n in booking.notifications() {
                let marker = if n.is_read { " " } else { "•" };
                println!("{} {} [{:?}] {}: {}", marker, n.id, n.kind, n.title, n.message);
            }
        }
        NotificationCommand::Read { id } => {
            if !booking.mark_notification_read(&id) {
                eprintln!("Notification not found: {}", id);
            }
        }
        NotificationCommand::ReadAll => booking.mark_all_notifications_read(),
        NotificationCommand::Clear => booking.clear_notifications(),
    }
}

fn family(app: &mut HealthApp, cmd: FamilyCommand, today: NaiveDate) -> anyhow::Result<()> {
    match cmd {
        FamilyCommand::List => {
            let user = app.config().user_id().to_owned();
            for m in app.enhanced().family_members_of(&user) {
                println!(
                    "ID: {}, {} ({:?}), born {}, adult: {}",
                    m.id, m.name, m.relationship, m.date_of_birth, m.is_adult
                );
            }
        }
        FamilyCommand::Add {
            name,
            relationship,
            date_of_birth,
            gender,
            allergies,
            phone,
        } => {
            let head_user_id = app.config().user_id().to_owned();
            let id = app.enhanced_mut().add_family_member(
                NewFamilyMember {
                    head_user_id,
                    name,
                    relationship: relationship.into(),
                    date_of_birth,
                    gender: gender.into(),
                    blood_type: None,
                    allergies,
                    chronic_conditions: Vec::new(),
                    phone,
                },
                today,
            )?;
            println!("Added family member {}", id);
        }
        FamilyCommand::Remove { id } => {
            let removed = app.remove_family_member(&id)?;
            println!("Removed {}", removed.name);
        }
    }
    Ok(())
}

fn reminders(app: &mut HealthApp, cmd: ReminderCommand, today: NaiveDate) -> anyhow::Result<()> {
    let now = Utc::now();
    let patient_id = app.config().user_id().to_owned();
    let store = app.enhanced_mut();
    match cmd {
        ReminderCommand::List => {
            for r in store.medication_reminders() {
                let adherence = store
                    .adherence_rate(&r.id)
                    .map(|rate| format!("{:.0}%", rate * 100.0))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "ID: {}, {} {} ({:?}), left {}/{}, active: {}, adherence: {}{}",
                    r.id,
                    r.medication_name,
                    r.dosage,
                    r.frequency,
                    r.remaining_quantity,
                    r.total_quantity,
                    r.is_active,
                    adherence,
                    if r.needs_refill() { ", needs refill" } else { "" }
                );
            }
        }
        ReminderCommand::Add {
            medication,
            dosage,
            frequency,
            times,
            quantity,
            refill_threshold,
            family_member,
        } => {
            let id = store.add_medication_reminder(NewMedicationReminder {
                patient_id,
                family_member_id: family_member,
                medication_name: medication,
                dosage,
                frequency: frequency.into(),
                times,
                start_date: today,
                end_date: None,
                instructions: None,
                total_quantity: quantity,
                refill_threshold,
                auto_refill: false,
            })?;
            println!("Added reminder {}", id);
        }
        ReminderCommand::Taken { id } => {
            store.log_medication_taken(&id, now, None)?;
            if let Some(r) = store.reminder(&id) {
                println!("Logged; {} doses left", r.remaining_quantity);
            }
        }
        ReminderCommand::Skipped { id } => {
            store.log_medication_skipped(&id, now, None)?;
        }
        ReminderCommand::Refill { id, quantity } => store.refill_medication(&id, quantity)?,
        ReminderCommand::Pause { id } => store.set_reminder_active(&id, false)?,
        ReminderCommand::Resume { id } => store.set_reminder_active(&id, true)?,
        ReminderCommand::Delete { id } => store.delete_medication_reminder(&id)?,
    }
    Ok(())
}

async fn follow_ups(app: &mut HealthApp, cmd: FollowUpCommand) -> anyhow::Result<()> {
    match cmd {
        FollowUpCommand::List => {
            let user = app.config().user_id().to_owned();
            for f in app.enhanced().pending_follow_ups(&user) {
                println!(
                    "ID: {}, visit {} with {}, due {}",
                    f.id,
                    f.visit_date,
                    f.doctor_name,
                    f.scheduled_for.format("%Y-%m-%d %H:%M")
                );
                for q in &f.questions {
                    println!("  ? {}", q);
                }
            }
        }
        FollowUpCommand::Respond { id, response, notes } => {
            let status = app.respond_to_follow_up(&id, response.into(), notes).await?;
            println!("Follow-up {} is now {}", id, status.as_str());
        }
        FollowUpCommand::Messages { id } => {
            for m in app.enhanced().messages_for_follow_up(&id) {
                println!("[{:?}] {}", m.sender, m.text);
            }
        }
    }
    Ok(())
}

async fn prescriptions(
    app: &mut HealthApp,
    cmd: PrescriptionCommand,
    today: NaiveDate,
) -> anyhow::Result<()> {
    match cmd {
        PrescriptionCommand::List => {
            for rx in app.pharmacy().prescriptions() {
                println!(
                    "ID: {}, {:?}, status: {}, issued {}, valid: {}",
                    rx.id,
                    rx.source,
                    rx.status.as_str(),
                    rx.issued_on,
                    rx.validation.is_valid
                );
                for issue in &rx.validation.issues {
                    println!("  ! {}", issue);
                }
                for m in &rx.medications {
                    let mark = if m.is_selected { "x" } else { " " };
                    println!("  [{}] {} {} × {} ({:.2} LYD)", mark, m.id, m.name, m.quantity, m.price);
                }
            }
        }
        PrescriptionCommand::Upload {
            medications,
            doctor_name,
            issued_on,
            image,
        } => {
            let mut lines = Vec::with_capacity(medications.len());
            for (id, quantity) in medications {
                let med = catalog::find_medication(&id)
                    .with_context(|| format!("unknown medication {id}"))?;
                lines.push(NewPrescriptionMedication {
                    id: med.id.to_owned(),
                    name: med.name.to_owned(),
                    dosage: med.dosage.to_owned(),
                    instructions: None,
                    quantity,
                    max_quantity: quantity,
                    price: med.price,
                });
            }
            let patient_id = app.config().user_id().to_owned();
            let (id, status) = app
                .submit_uploaded_prescription(
                    NewPrescription {
                        patient_id,
                        doctor_id: None,
                        doctor_name,
                        clinic_name: None,
                        image_ref: image,
                        issued_on: issued_on.unwrap_or(today),
                        medications: lines,
                    },
                    today,
                )
                .await?;
            println!("Prescription {} is {}", id, status.as_str());
        }
        PrescriptionCommand::Toggle { id, medication_id } => {
            let selected = app
                .pharmacy_mut()
                .toggle_medication_selection(&id, &medication_id)?;
            println!("{} selected: {}", medication_id, selected);
        }
        PrescriptionCommand::Quantity {
            id,
            medication_id,
            quantity,
        } => {
            let applied = app
                .pharmacy_mut()
                .update_medication_quantity(&id, &medication_id, quantity)?;
            println!("{} quantity: {}", medication_id, applied);
        }
        PrescriptionCommand::Pharmacies { id } => {
            for p in app.pharmacy().get_pharmacies_with_stock(&id)? {
                println!(
                    "{} {} ({:.1} km, {:.2} LYD delivery): {:?}{}",
                    p.pharmacy.id,
                    p.pharmacy.name,
                    p.pharmacy.distance_km,
                    p.pharmacy.delivery_fee,
                    p.stock_availability,
                    if p.missing.is_empty() {
                        String::new()
                    } else {
                        format!(", missing {}", p.missing.join(", "))
                    }
                );
            }
        }
        PrescriptionCommand::Expire => {
            let expired = app.pharmacy_mut().expire_stale_prescriptions(today);
            println!("Expired {} prescriptions", expired);
        }
    }
    Ok(())
}

async fn orders(app: &mut HealthApp, cmd: OrderCommand) -> anyhow::Result<()> {
    match cmd {
        OrderCommand::List => {
            for o in app.pharmacy().orders() {
                println!(
                    "ID: {}, {}, status: {}, payment: {:?}/{:?}, total {:.2} LYD",
                    o.id,
                    o.pharmacy_name,
                    o.status.as_str(),
                    o.payment_method,
                    o.payment_status,
                    o.totals.total_amount
                );
            }
        }
        OrderCommand::Show { id } => {
            let order = app
                .pharmacy()
                .order(&id)
                .with_context(|| format!("order not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(order)?);
        }
        OrderCommand::Quote {
            prescription,
            pharmacy,
        } => {
            let totals = app.pharmacy().quote_order(&prescription, &pharmacy)?;
            println!(
                "subtotal {:.2} + delivery {:.2} + service {:.2} = {:.2} LYD",
                totals.subtotal, totals.delivery_fee, totals.service_fee, totals.total_amount
            );
        }
        OrderCommand::Place {
            prescription,
            pharmacy,
            payment,
            address,
        } => {
            let receipt = app
                .place_pharmacy_order(&prescription, &pharmacy, payment.into(), &address)
                .await?;
            println!(
                "Order {}: {} (payment {:?})",
                receipt.order_id,
                receipt.status.as_str(),
                receipt.payment_status
            );
        }
        OrderCommand::Pay { id } => {
            if app.pay_pharmacy_order(&id).await? {
                println!("Payment completed for {}", id);
            } else {
                println!("Payment declined for {}", id);
            }
        }
        OrderCommand::Deliver { id } => {
            app.mark_order_delivered(&id)?;
            println!("Delivered {}", id);
        }
        OrderCommand::Cancel { id, reason } => {
            app.cancel_pharmacy_order(&id, &reason)?;
            println!("Cancelled {}", id);
        }
    }
    Ok(())
}
